//! Admin endpoints: user provisioning, balance adjustments, freezing.
//!
//! The engine enforces the admin role for adjustments and freezes. User
//! registration carries no caller in the engine and is gated here.

use api_types::{
    transaction::{AdjustmentNew, ReceiptView},
    user::{UserNew, UserView},
    wallet::{FreezeWallet, WalletView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use engine::{AdjustBalanceCmd, EngineError, RegisterUserCmd, Role, User};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{IdempotencyKey, ServerState},
    transfers::created_or_replayed,
    views,
};

pub async fn register_user(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<UserView>), ServerError> {
    if user.role != Role::Admin {
        return Err(EngineError::Forbidden("admin only".to_string()).into());
    }
    let cmd = RegisterUserCmd::new(
        payload.username,
        payload.full_name,
        views::role_from_api(payload.role),
    );
    let (created, _wallet) = state.engine.register_user(cmd).await?;
    Ok((StatusCode::CREATED, Json(views::user_view(created))))
}

pub async fn adjust(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<AdjustmentNew>,
) -> Result<(StatusCode, Json<ReceiptView>), ServerError> {
    let cmd = AdjustBalanceCmd::new(
        user.id,
        payload.user_id,
        payload.amount,
        payload.reason,
        IdempotencyKey::or_missing(key),
    );
    let receipt = state.engine.adjust_balance(cmd).await?;
    Ok((
        created_or_replayed(receipt.replayed),
        Json(views::receipt_view(receipt)),
    ))
}

pub async fn freeze(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<FreezeWallet>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state
        .engine
        .freeze_wallet(user.id, user_id, &payload.reason)
        .await?;
    Ok(Json(views::wallet_view(wallet)))
}

pub async fn unfreeze(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state.engine.unfreeze_wallet(user.id, user_id).await?;
    Ok(Json(views::wallet_view(wallet)))
}
