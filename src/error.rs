//! Error taxonomy for the protection edge.
//!
//! # Design Decisions
//! - One variant per denial class; every gate resolves its failure into
//!   exactly one of these before it reaches the caller
//! - Cipher failures carry no detail (the message is fixed) so nothing
//!   usable for an oracle attack reaches the client
//! - HTTP status mapping lives in `http::response`, event mapping here

use thiserror::Error;

use crate::events::SecurityEventKind;
use crate::protect::abuse::AbuseReason;

/// Errors produced by the protection gates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtectError {
    /// Structurally invalid token or input.
    #[error("malformed token")]
    Malformed,

    /// Token past its validity window.
    #[error("token expired")]
    Expired,

    /// Signature mismatch: tampered token or wrong signing secret.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token issuance requested with a zero TTL.
    #[error("invalid ttl: must be greater than zero")]
    InvalidTtl,

    /// The caller's scopes do not cover the operation.
    #[error("insufficient scope")]
    InsufficientScope,

    /// Request budget exhausted for the current window.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Streaming activity matched an abuse heuristic.
    #[error("abusive request pattern: {reason}")]
    AbuseDetected { reason: AbuseReason },

    /// Ciphertext failed authentication or key/resource mismatch.
    #[error("payload cipher failure")]
    DecryptionFailure,

    /// Track is unknown or not streamable.
    #[error("track not found")]
    NotFound,
}

impl ProtectError {
    /// Security event kind emitted when this error denies a request.
    pub fn event_kind(&self) -> SecurityEventKind {
        match self {
            ProtectError::Malformed
            | ProtectError::Expired
            | ProtectError::InvalidSignature
            | ProtectError::InvalidTtl => SecurityEventKind::TokenRejected,
            ProtectError::InsufficientScope => SecurityEventKind::CapabilityDenied,
            ProtectError::RateLimited { .. } => SecurityEventKind::RateLimited,
            ProtectError::AbuseDetected { .. } => SecurityEventKind::AbuseDetected,
            ProtectError::DecryptionFailure => SecurityEventKind::CipherFailure,
            ProtectError::NotFound => SecurityEventKind::TrackNotFound,
        }
    }
}
