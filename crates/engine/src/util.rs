//! Internal helpers for validation and conversion.
//!
//! These utilities are **not** part of the public API.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a stored UUID column, labelling the failure with `label`.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidInput(format!("invalid {label} id")))
}

/// Human-readable code: `PREFIX-YYYYMMDD-XXXXXXXX`.
pub(crate) fn readable_code(prefix: &str, now: DateTime<Utc>) -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}-{}-{}", now.format("%Y%m%d"), &simple[..8])
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Money-moving operations never invent a key on the caller's behalf.
pub(crate) fn require_idempotency_key(key: &str) -> ResultEngine<String> {
    normalize_required_text(key, "idempotency_key")
}

pub(crate) fn require_positive(amount: i64, label: &str) -> ResultEngine<i64> {
    if amount <= 0 {
        return Err(EngineError::InvalidInput(format!("{label} must be > 0")));
    }
    Ok(amount)
}
