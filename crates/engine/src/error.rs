//! The module contains the errors the engine can throw.
//!
//! Every [`EngineError`] belongs to an [`ErrorKind`], which carries the
//! stable machine-readable code exposed to callers. Callers must branch on the
//! kind, never on the message.
//!
//! Only [`ErrorKind::InfrastructureFailure`] is retryable: every other kind is
//! detected before any write happens, so retrying with the same idempotency
//! key would fail the same way.
use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Wallet frozen: {0}")]
    Frozen(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Self targeting: {0}")]
    SelfTargeting(String),
    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),
    #[error("Expired: {0}")]
    Expired(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Stable classification of [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientBalance,
    Frozen,
    Forbidden,
    SelfTargeting,
    DuplicateRequest,
    SignatureInvalid,
    Expired,
    InvalidInput,
    InfrastructureFailure,
}

impl ErrorKind {
    /// Machine-readable code, stable across releases.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::Frozen => "WALLET_FROZEN",
            Self::Forbidden => "FORBIDDEN",
            Self::SelfTargeting => "SELF_TARGETING",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::Expired => "QR_EXPIRED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InfrastructureFailure => "INFRASTRUCTURE_FAILURE",
        }
    }

    /// Whether a retry with the same idempotency key may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::InfrastructureFailure)
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            Self::Frozen(_) => ErrorKind::Frozen,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::SelfTargeting(_) => ErrorKind::SelfTargeting,
            Self::DuplicateRequest(_) => ErrorKind::DuplicateRequest,
            Self::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            Self::Expired(_) => ErrorKind::Expired,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Database(_) => ErrorKind::InfrastructureFailure,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// True when the database rejected a write because of a UNIQUE index,
    /// which is how two racing requests with the same idempotency key surface.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(err) => {
                matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
            }
            _ => false,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::InsufficientBalance(a), Self::InsufficientBalance(b)) => a == b,
            (Self::Frozen(a), Self::Frozen(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::SelfTargeting(a), Self::SelfTargeting(b)) => a == b,
            (Self::DuplicateRequest(a), Self::DuplicateRequest(b)) => a == b,
            (Self::SignatureInvalid(a), Self::SignatureInvalid(b)) => a == b,
            (Self::Expired(a), Self::Expired(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            ErrorKind::NotFound,
            ErrorKind::InvalidState,
            ErrorKind::InsufficientBalance,
            ErrorKind::Frozen,
            ErrorKind::Forbidden,
            ErrorKind::SelfTargeting,
            ErrorKind::DuplicateRequest,
            ErrorKind::SignatureInvalid,
            ErrorKind::Expired,
            ErrorKind::InvalidInput,
            ErrorKind::InfrastructureFailure,
        ];
        let mut codes: Vec<&str> = kinds.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn only_database_errors_are_retryable() {
        assert!(EngineError::Database(DbErr::Custom("lock timeout".to_string())).is_retryable());
        assert!(!EngineError::InsufficientBalance("wallet".to_string()).is_retryable());
        assert!(!EngineError::InvalidState("qr already used".to_string()).is_retryable());
    }

    #[test]
    fn custom_db_error_is_not_a_unique_violation() {
        let err = EngineError::Database(DbErr::Custom("boom".to_string()));
        assert!(!err.is_unique_violation());
        assert_eq!(err.kind(), ErrorKind::InfrastructureFailure);
    }
}
