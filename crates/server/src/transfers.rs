//! Peer-to-peer transfer endpoint.

use api_types::transaction::{ReceiptView, TransferNew};
use axum::{Extension, Json, extract::State, http::StatusCode};
use axum_extra::TypedHeader;
use engine::{TransferCmd, User};

use crate::{
    ServerError,
    server::{IdempotencyKey, ServerState},
    views,
};

/// Replays answer 200 with the stored receipt; fresh transfers answer 201.
pub(crate) fn created_or_replayed(replayed: bool) -> StatusCode {
    if replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    }
}

pub async fn transfer(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<TransferNew>,
) -> Result<(StatusCode, Json<ReceiptView>), ServerError> {
    let mut cmd = TransferCmd::new(
        user.id,
        payload.to_user_id,
        payload.amount,
        IdempotencyKey::or_missing(key),
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    let receipt = state.engine.transfer(cmd).await?;
    Ok((
        created_or_replayed(receipt.replayed),
        Json(views::receipt_view(receipt)),
    ))
}
