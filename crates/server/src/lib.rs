use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{EngineError, ErrorKind};

use api_types::ErrorBody;
pub use server::{run, run_with_listener, spawn_with_listener};

mod admin;
mod missions;
mod products;
mod qr;
mod server;
mod transfers;
mod views;
mod wallets;

pub mod types {
    pub mod user {
        pub use api_types::user::{Role, UserNew, UserView};
    }

    pub mod wallet {
        pub use api_types::wallet::{
            Direction, FreezeWallet, LedgerEntryView, LedgerResponse, WalletView,
        };
    }

    pub mod transaction {
        pub use api_types::transaction::{
            AdjustmentNew, ReceiptView, TransactionListResponse, TransactionView, TransferNew,
            WalletTransactionView,
        };
    }

    pub mod qr {
        pub use api_types::qr::{QrNew, QrPay, QrView};
    }

    pub mod mission {
        pub use api_types::mission::{
            GradeView, MissionGrade, MissionLogView, MissionNew, MissionSubmit, MissionView,
        };
    }

    pub mod product {
        pub use api_types::product::{OrderView, ProductNew, ProductView, PurchaseNew, PurchaseView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Unauthorized,
    Generic(String),
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidState | ErrorKind::DuplicateRequest => StatusCode::CONFLICT,
        ErrorKind::Frozen => StatusCode::LOCKED,
        ErrorKind::Expired => StatusCode::GONE,
        ErrorKind::InsufficientBalance
        | ErrorKind::SelfTargeting
        | ErrorKind::SignatureInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::InfrastructureFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error) = match self {
            ServerError::Engine(err) => {
                let kind = err.kind();
                (
                    status_for_kind(kind),
                    kind.code().to_string(),
                    message_for_engine_error(err),
                )
            }
            ServerError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED".to_string(),
                "missing or unknown x-user-id".to_string(),
            ),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string(), err),
        };

        (status, Json(ErrorBody { code, error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res = ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_duplicate_maps_to_409() {
        let res = ServerError::from(EngineError::DuplicateRequest("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_insufficient_balance_maps_to_422() {
        let res =
            ServerError::from(EngineError::InsufficientBalance("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn expired_qr_maps_to_410() {
        let res = ServerError::from(EngineError::Expired("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::GONE);
    }

    #[test]
    fn database_error_is_opaque() {
        let res = ServerError::from(EngineError::Database(sea_orm::DbErr::Custom(
            "disk full".to_string(),
        )))
        .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
