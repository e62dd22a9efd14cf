//! QR code signatures.
//!
//! A QR code is signed with HMAC-SHA256 over `code|amount|payee_id`. Binding
//! the amount and the payee into the MAC means a leaked code string cannot be
//! replayed with a different amount or redirected to a different payee.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

type HmacSha256 = Hmac<Sha256>;

fn message(code: &str, amount: i64, payee_id: Uuid) -> String {
    format!("{code}|{amount}|{payee_id}")
}

fn mac(code: &str, amount: i64, payee_id: Uuid, secret: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(message(code, amount, payee_id).as_bytes());
    Some(mac)
}

/// Hex-encoded HMAC-SHA256 of the QR fields.
pub fn sign(code: &str, amount: i64, payee_id: Uuid, secret: &[u8]) -> ResultEngine<String> {
    let mac = mac(code, amount, payee_id, secret)
        .ok_or_else(|| EngineError::InvalidInput("invalid qr signing secret".to_string()))?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` against the QR fields in constant time.
///
/// Malformed hex is treated as a mismatch.
pub fn verify(code: &str, amount: i64, payee_id: Uuid, signature: &str, secret: &[u8]) -> bool {
    let Ok(raw) = hex::decode(signature) else {
        return false;
    };
    let Some(mac) = mac(code, amount, payee_id, secret) else {
        return false;
    };
    mac.verify_slice(&raw).is_ok()
}
