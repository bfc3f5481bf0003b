//! Security event emission.
//!
//! # Data Flow
//! ```text
//! Gate denial / audited success
//!     → SecurityEvent (typed, append-only)
//!     → sink.rs (bounded channel, drop-on-full)
//!     → writer task (structured log line + metrics)
//! ```
//!
//! # Design Decisions
//! - Emission never blocks the request path: the channel is bounded and
//!   events are dropped (and counted) under backpressure
//! - Events are write-only from this subsystem's point of view; nothing
//!   here reads them back

pub mod sink;

use serde::Serialize;

use crate::protect::unix_seconds;

pub use sink::{spawn_writer, SecurityEventSink};

/// The class of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    CapabilityDenied,
    RateLimited,
    AbuseDetected,
    TokenRejected,
    CipherFailure,
    TrackNotFound,
    /// Audit-all mode only.
    TokenIssued,
    /// Audit-all mode only.
    ChunkServed,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::CapabilityDenied => "capability_denied",
            SecurityEventKind::RateLimited => "rate_limited",
            SecurityEventKind::AbuseDetected => "abuse_detected",
            SecurityEventKind::TokenRejected => "token_rejected",
            SecurityEventKind::CipherFailure => "cipher_failure",
            SecurityEventKind::TrackNotFound => "track_not_found",
            SecurityEventKind::TokenIssued => "token_issued",
            SecurityEventKind::ChunkServed => "chunk_served",
        }
    }
}

/// One append-only security event record.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub identity_key: String,
    pub ip: String,
    pub user_agent: String,
    pub endpoint: String,
    pub request_id: String,
    pub timestamp: u64,
    pub metadata: serde_json::Value,
}

impl SecurityEvent {
    pub fn new(
        kind: SecurityEventKind,
        identity_key: impl Into<String>,
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        endpoint: impl Into<String>,
        request_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            identity_key: identity_key.into(),
            ip: ip.into(),
            user_agent: user_agent.into(),
            endpoint: endpoint.into(),
            request_id: request_id.into(),
            timestamp: unix_seconds(),
            metadata,
        }
    }
}
