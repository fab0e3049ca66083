// 🔐 Shared-secret check for operator endpoints
//
// Both sides are hashed first so the comparison runs over equal-length
// digests, then compared in constant time. No configured secret means every
// request is refused.

use crate::error::{EngineError, Result};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const RECONCILE_SECRET_HEADER: &str = "x-reconcile-secret";

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

pub fn verify_shared_secret(configured: Option<&str>, presented: Option<&str>) -> Result<()> {
    let configured = match configured {
        Some(secret) if !secret.is_empty() => secret,
        _ => return Err(EngineError::SecretNotConfigured),
    };
    let presented = presented.ok_or(EngineError::Unauthorized)?;

    if bool::from(digest(configured).ct_eq(&digest(presented))) {
        Ok(())
    } else {
        Err(EngineError::Unauthorized)
    }
}
