//! Wallet read endpoints for the calling user.

use api_types::{
    PageQuery,
    transaction::TransactionListResponse,
    user::UserView,
    wallet::{LedgerResponse, WalletView},
};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use engine::{Page, User};

use crate::{ServerError, server::ServerState, views};

pub(crate) fn page(query: &PageQuery) -> Page {
    let default = Page::default();
    Page::number(query.page.unwrap_or(1), query.per_page.unwrap_or(default.limit))
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserView> {
    Json(views::user_view(user))
}

pub async fn wallet(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state.engine.wallet(user.id).await?;
    Ok(Json(views::wallet_view(wallet)))
}

pub async fn ledger(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<LedgerResponse>, ServerError> {
    let entries = state.engine.ledger(user.id, page(&query)).await?;
    Ok(Json(LedgerResponse {
        entries: entries.into_iter().map(views::entry_view).collect(),
    }))
}

pub async fn transactions(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let transactions = state.engine.transactions(user.id, page(&query)).await?;
    Ok(Json(TransactionListResponse {
        transactions: transactions
            .into_iter()
            .map(views::wallet_transaction_view)
            .collect(),
    }))
}
