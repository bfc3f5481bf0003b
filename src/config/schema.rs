//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! protection edge. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

use crate::protect::rate_limit::RouteClass;
use crate::protect::token::Permission;

/// Root configuration for the streaming protection edge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Token issuance settings.
    pub token: TokenConfig,

    /// Payload encryption settings.
    pub cipher: CipherConfig,

    /// Rate limiting table per route class.
    pub rate_limit: RateLimitConfig,

    /// Abuse detection thresholds.
    pub abuse: AbuseConfig,

    /// API keys recognized by the capability gate.
    pub api_keys: Vec<ApiKeyConfig>,

    /// Security event sink settings.
    pub events: EventsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Token issuance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Signing secret as 64 hex characters. Generated per process when
    /// absent; multi-instance deployments must supply one.
    pub signing_secret: Option<String>,

    /// TTL applied when a request does not name one.
    pub default_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            default_ttl_secs: 3600,
        }
    }
}

/// Payload cipher configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CipherConfig {
    /// Root secret for per-track key derivation, 64 hex characters.
    /// Generated per process when absent.
    pub root_secret: Option<String>,
}

/// Budget for one route class.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RouteBudget {
    /// Requests admitted per window.
    pub limit: u32,

    /// Window length in seconds.
    pub window_seconds: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Budget for token issuance requests.
    pub token: RouteBudget,

    /// Budget for chunk retrieval requests.
    pub stream: RouteBudget,

    /// Budget for any other route.
    pub default: RouteBudget,
}

impl RateLimitConfig {
    /// Budget for a route class.
    pub fn budget(&self, class: RouteClass) -> RouteBudget {
        match class {
            RouteClass::Token => self.token,
            RouteClass::Stream => self.stream,
            RouteClass::Other => self.default,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: RouteBudget {
                limit: 30,
                window_seconds: 60,
            },
            stream: RouteBudget {
                limit: 120,
                window_seconds: 60,
            },
            default: RouteBudget {
                limit: 60,
                window_seconds: 60,
            },
        }
    }
}

/// Abuse detection thresholds.
///
/// Concrete thresholds are a configuration surface, not hidden rules;
/// defaults are tuned for normal playback cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AbuseConfig {
    /// Same-track requests above this count within the velocity window
    /// are flagged.
    pub velocity_limit: usize,

    /// Velocity window in seconds.
    pub velocity_window_secs: u64,

    /// Distinct network origins at or above this count within the
    /// origin window are flagged.
    pub origin_limit: usize,

    /// Origin window in seconds.
    pub origin_window_secs: u64,

    /// Re-requests of one chunk above this count within the replay
    /// window are flagged.
    pub replay_limit: usize,

    /// Replay window in seconds.
    pub replay_window_secs: u64,

    /// Maximum attempts retained per identity.
    pub history_capacity: usize,

    /// Maximum attempt age in seconds.
    pub history_horizon_secs: u64,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            velocity_limit: 20,
            velocity_window_secs: 10,
            origin_limit: 2,
            origin_window_secs: 30,
            replay_limit: 5,
            replay_window_secs: 10,
            history_capacity: 256,
            history_horizon_secs: 300,
        }
    }
}

/// One API key recognized by the capability gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    /// Identity name used for rate/abuse state and logs.
    pub name: String,

    /// The key material presented by the caller.
    pub key: String,

    /// Scopes this key may exercise.
    pub scopes: Vec<Permission>,
}

/// Security event sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffered events before emission starts dropping.
    pub buffer_size: usize,

    /// Also emit events for served requests, not only denials.
    pub audit_all: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            audit_all: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
