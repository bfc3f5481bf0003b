//! Signed, time-bounded access tokens.
//!
//! # Token Format
//! ```text
//! base64url(claims_json) "." base64url(mac)
//!
//! mac = blake3::keyed_hash(signing_secret, claims_json)
//! ```
//!
//! # Design Decisions
//! - Claims are immutable once issued; verification returns a decoded
//!   copy, never a mutable handle
//! - The signature is checked before expiry so a tampered expiry field
//!   can never influence the outcome
//! - Expiry comparison uses wall-clock whole seconds
//! - Rotating the signing secret invalidates every outstanding token;
//!   this is accepted and documented behavior

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ProtectError;
use crate::protect::unix_seconds;

/// A capability a token or API key may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    /// Stream encrypted audio chunks.
    Stream,
    /// Download a low-quality preview.
    DownloadPreview,
}

/// Decoded claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub track_id: String,
    pub user_id: String,
    pub issued_at: u64,
    pub expires_at: u64,
    pub permissions: Vec<Permission>,
}

impl AccessToken {
    /// Whether the token grants the given permission.
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Issues and verifies signed access tokens.
///
/// The signing secret is process-wide, injected at construction, and
/// immutable for the codec's lifetime.
pub struct TokenCodec {
    secret: [u8; 32],
    default_ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(secret: [u8; 32], default_ttl_secs: u64) -> Self {
        Self {
            secret,
            default_ttl_secs,
        }
    }

    /// Issue a signed token binding a track, a user, and a permission
    /// set, valid for `ttl_seconds` (or the default TTL when `None`).
    pub fn issue(
        &self,
        track_id: &str,
        user_id: &str,
        permissions: Vec<Permission>,
        ttl_seconds: Option<u64>,
    ) -> Result<String, ProtectError> {
        self.issue_at(track_id, user_id, permissions, ttl_seconds, unix_seconds())
    }

    fn issue_at(
        &self,
        track_id: &str,
        user_id: &str,
        permissions: Vec<Permission>,
        ttl_seconds: Option<u64>,
        now: u64,
    ) -> Result<String, ProtectError> {
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_secs);
        if ttl == 0 {
            return Err(ProtectError::InvalidTtl);
        }

        let claims = AccessToken {
            track_id: track_id.to_string(),
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + ttl,
            permissions,
        };

        let payload = serde_json::to_vec(&claims).map_err(|_| ProtectError::Malformed)?;
        let mac = blake3::keyed_hash(&self.secret, &payload);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(mac.as_bytes())
        ))
    }

    /// Verify a token string and return its claims.
    ///
    /// Fails with `Malformed` on structural problems, `InvalidSignature`
    /// on a MAC mismatch, and `Expired` once `now >= expires_at`.
    pub fn verify(&self, token: &str) -> Result<AccessToken, ProtectError> {
        self.verify_at(token, unix_seconds())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<AccessToken, ProtectError> {
        let (payload_b64, mac_b64) = token.split_once('.').ok_or(ProtectError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ProtectError::Malformed)?;
        let mac_bytes = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| ProtectError::Malformed)?;
        let mac: [u8; 32] = mac_bytes
            .try_into()
            .map_err(|_| ProtectError::Malformed)?;

        // blake3::Hash equality is constant-time.
        let expected = blake3::keyed_hash(&self.secret, &payload);
        if blake3::Hash::from(mac) != expected {
            return Err(ProtectError::InvalidSignature);
        }

        let claims: AccessToken =
            serde_json::from_slice(&payload).map_err(|_| ProtectError::Malformed)?;
        if claims.expires_at <= claims.issued_at {
            return Err(ProtectError::Malformed);
        }
        if now >= claims.expires_at {
            return Err(ProtectError::Expired);
        }

        Ok(claims)
    }
}
