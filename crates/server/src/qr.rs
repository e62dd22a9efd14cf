//! QR code endpoints.

use api_types::{
    qr::{QrNew, QrPay, QrView},
    transaction::ReceiptView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use engine::{CreateQrCmd, QrPaymentCmd, User};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{IdempotencyKey, ServerState},
    transfers::created_or_replayed,
    views,
};

pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<QrNew>,
) -> Result<(StatusCode, Json<QrView>), ServerError> {
    let mut cmd = CreateQrCmd::new(user.id, payload.amount);
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(product_id) = payload.product_id {
        cmd = cmd.product(product_id);
    }
    let qr = state.engine.create_qr(cmd).await?;
    Ok((StatusCode::CREATED, Json(views::qr_view(qr))))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(code): Path<String>,
) -> Result<Json<QrView>, ServerError> {
    let qr = state.engine.qr(&code, user.id).await?;
    Ok(Json(views::qr_view(qr)))
}

pub async fn cancel(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(qr_id): Path<Uuid>,
) -> Result<Json<QrView>, ServerError> {
    let qr = state.engine.cancel_qr(qr_id, user.id).await?;
    Ok(Json(views::qr_view(qr)))
}

pub async fn pay(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<QrPay>,
) -> Result<(StatusCode, Json<ReceiptView>), ServerError> {
    let cmd = QrPaymentCmd::new(user.id, payload.code, IdempotencyKey::or_missing(key));
    let receipt = state.engine.pay_qr(cmd).await?;
    Ok((
        created_or_replayed(receipt.replayed),
        Json(views::receipt_view(receipt)),
    ))
}
