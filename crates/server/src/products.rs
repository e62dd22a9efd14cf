//! Marketplace endpoints.

use api_types::product::{ProductNew, ProductView, PurchaseNew, PurchaseView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use engine::{CreateProductCmd, PurchaseCmd, User};
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
    Json(payload): Json<ProductNew>,
) -> Result<(StatusCode, Json<ProductView>), ServerError> {
    let mut cmd = CreateProductCmd::new(user.id, payload.name, payload.price).stock(payload.stock);
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if payload.is_unlimited {
        cmd = cmd.unlimited();
    }
    let product = state.engine.create_product(cmd).await?;
    Ok((StatusCode::CREATED, Json(views::product_view(product))))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductView>, ServerError> {
    let product = state.engine.product(product_id).await?;
    Ok(Json(views::product_view(product)))
}

pub async fn deactivate(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductView>, ServerError> {
    let product = state.engine.deactivate_product(product_id, user.id).await?;
    Ok(Json(views::product_view(product)))
}

pub async fn purchase(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(product_id): Path<Uuid>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<PurchaseNew>,
) -> Result<(StatusCode, Json<PurchaseView>), ServerError> {
    let cmd = PurchaseCmd::new(
        user.id,
        product_id,
        payload.quantity,
        IdempotencyKey::or_missing(key),
    );
    let purchase = state.engine.purchase(cmd).await?;
    Ok((
        created_or_replayed(purchase.receipt.replayed),
        Json(views::purchase_view(purchase)),
    ))
}
