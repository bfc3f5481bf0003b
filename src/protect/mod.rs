//! Content protection subsystem.
//!
//! # Data Flow
//! ```text
//! Token issuance:
//!     → capability.rs (API key scopes cover the request)
//!     → rate_limit.rs (per-identity budget for the token route)
//!     → abuse.rs (recent-activity heuristics)
//!     → token.rs (sign claims, return opaque string)
//!
//! Chunk retrieval:
//!     → capability.rs → rate_limit.rs → abuse.rs
//!     → token.rs (verify signature, expiry, permission)
//!     → cipher.rs (per-track authenticated decryption)
//!     → watermark.rs (per-request attribution marker)
//! ```
//!
//! # Design Decisions
//! - Fail closed: any gate failure denies the request
//! - Secrets are immutable after startup and shared read-only
//! - Mutable state (rate windows, abuse histories) is partitioned per
//!   identity key so unrelated identities never contend

pub mod abuse;
pub mod capability;
pub mod cipher;
pub mod rate_limit;
pub mod token;
pub mod watermark;

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// A secret supplied as 64 hex characters failed to decode.
#[derive(Debug, Error)]
#[error("secret must be 64 hex characters (32 bytes)")]
pub struct SecretError;

/// Decode a configured secret, or generate a fresh random one for this
/// process's lifetime when none is supplied.
///
/// Generated secrets are fine for development; multi-instance
/// deployments must share explicit secrets or tokens and ciphertext
/// will not validate across instances.
pub fn resolve_secret(configured: Option<&str>) -> Result<[u8; 32], SecretError> {
    match configured {
        Some(hex_str) => {
            let bytes = hex::decode(hex_str).map_err(|_| SecretError)?;
            let arr: [u8; 32] = bytes.try_into().map_err(|_| SecretError)?;
            Ok(arr)
        }
        None => {
            use rand::RngCore;
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            tracing::warn!(
                "No secret configured; generated an ephemeral one for this process"
            );
            Ok(bytes)
        }
    }
}

/// Wall-clock time as whole seconds since the Unix epoch.
pub(crate) fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Wall-clock time as milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Wall-clock time as nanoseconds since the Unix epoch.
pub(crate) fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_secret_from_hex() {
        let hex_str = "ab".repeat(32);
        let secret = resolve_secret(Some(&hex_str)).unwrap();
        assert_eq!(secret, [0xab; 32]);
    }

    #[test]
    fn test_resolve_secret_rejects_bad_input() {
        assert!(resolve_secret(Some("not-hex")).is_err());
        assert!(resolve_secret(Some("abcd")).is_err()); // too short
    }

    #[test]
    fn test_resolve_secret_generates_when_absent() {
        let a = resolve_secret(None).unwrap();
        let b = resolve_secret(None).unwrap();
        assert_ne!(a, b);
    }
}
