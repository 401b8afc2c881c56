//! Optional GitHub-style webhook signatures.
//!
//! Senders put `sha256=<hex HMAC-SHA256(secret, raw body)>` in
//! `X-Hub-Signature-256`. Verification only happens when a secret is
//! configured.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn keyed_mac(secret: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac)
}

/// Compute the header value a sender would attach to `body`.
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mac = keyed_mac(secret, body)?;
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check of `signature` (the full header value) for `body`.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    keyed_mac(secret, body).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Reject the delivery with 401 when a secret is set and the signature is
/// missing or wrong. Passes everything through otherwise.
pub fn check_webhook(
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), AppError> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if verify_signature(secret, body, signature) {
        Ok(())
    } else {
        warn!("webhook signature verification failed");
        Err(AppError::unauthorized("invalid webhook signature"))
    }
}
