use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as HeaderError, Header},
};
use uuid::Uuid;

use std::{net::SocketAddr, sync::Arc};

use crate::{ServerError, admin, missions, products, qr, transfers, wallets};
use engine::Engine;

static USER_HEADER: HeaderName = HeaderName::from_static("x-user-id");
static IDEMPOTENCY_HEADER: HeaderName = HeaderName::from_static("idempotency-key");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// `TypedHeader` carrying the authenticated caller.
///
/// Every request must contain an "x-user-id" entry holding the caller's UUID.
#[derive(Debug)]
pub(crate) struct UserHeader(pub Uuid);

impl Header for UserHeader {
    fn name() -> &'static HeaderName {
        &USER_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(HeaderError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(HeaderError::invalid());
        };
        let Ok(value) = Uuid::parse_str(value.trim()) else {
            return Err(HeaderError::invalid());
        };

        Ok(UserHeader(value))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        match HeaderValue::from_str(&self.0.to_string()) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-user-id header"),
        }
    }
}

/// `TypedHeader` for the client-chosen idempotency key of money-moving calls.
#[derive(Debug)]
pub(crate) struct IdempotencyKey(pub String);

impl IdempotencyKey {
    /// The key, or an empty one that the engine rejects as missing.
    pub(crate) fn or_missing(header: Option<TypedHeader<IdempotencyKey>>) -> String {
        header.map(|TypedHeader(key)| key.0).unwrap_or_default()
    }
}

impl Header for IdempotencyKey {
    fn name() -> &'static HeaderName {
        &IDEMPOTENCY_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(HeaderError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(HeaderError::invalid());
        };

        Ok(IdempotencyKey(value.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        match HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode idempotency-key header"),
        }
    }
}

/// Resolve the caller from `x-user-id` and attach the [`engine::User`].
async fn auth(
    user_header: Option<TypedHeader<UserHeader>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(TypedHeader(UserHeader(user_id))) = user_header else {
        return Err(ServerError::Unauthorized);
    };
    let user = state.engine.user(user_id).await.map_err(|err| {
        tracing::debug!(user = %user_id, "rejected caller: {err}");
        ServerError::Unauthorized
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/me", get(wallets::me))
        .route("/wallet", get(wallets::wallet))
        .route("/wallet/ledger", get(wallets::ledger))
        .route("/wallet/transactions", get(wallets::transactions))
        .route("/transfers", post(transfers::transfer))
        .route("/qr", post(qr::create))
        .route("/qr/pay", post(qr::pay))
        .route("/qr/{qr}", get(qr::get))
        .route("/qr/{qr}/cancel", post(qr::cancel))
        .route("/missions", post(missions::create))
        .route("/missions/{id}/deactivate", post(missions::deactivate))
        .route("/missions/{id}/start", post(missions::start))
        .route("/mission-logs/{id}", get(missions::log))
        .route("/mission-logs/{id}/submit", post(missions::submit))
        .route("/mission-logs/{id}/grade", post(missions::grade))
        .route("/products", post(products::create))
        .route("/products/{id}", get(products::get))
        .route("/products/{id}/deactivate", post(products::deactivate))
        .route("/products/{id}/purchase", post(products::purchase))
        .route("/admin/users", post(admin::register_user))
        .route("/admin/adjustments", post(admin::adjust))
        .route("/admin/wallets/{user_id}/freeze", post(admin::freeze))
        .route("/admin/wallets/{user_id}/unfreeze", post(admin::unfreeze))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_with_listener(engine, listener).await
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
