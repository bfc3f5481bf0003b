//! Fixed-window request budgets per identity and route class.
//!
//! # Design Decisions
//! - Fixed-window counter: `limit` requests per `window_seconds`,
//!   counter resets on rollover, fresh window starts at the first
//!   request after it
//! - Windows are partitioned by `(identity, route class)` in a sharded
//!   map; the increment happens under the shard guard so a concurrent
//!   burst can never admit more than `limit`
//! - Denials report the seconds remaining until the window resets

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ProtectError;
use crate::protect::unix_seconds;

/// Route classes with distinct budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Token issuance requests.
    Token,
    /// Audio chunk retrieval.
    Stream,
    /// Anything else.
    Other,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Token => "token",
            RouteClass::Stream => "stream",
            RouteClass::Other => "other",
        }
    }
}

/// One identity's counter for the current window.
struct FixedWindow {
    window_start: u64,
    count: u32,
}

/// Enforces per-identity request budgets.
pub struct RateLimiter {
    windows: DashMap<(String, RouteClass), FixedWindow>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Admit or deny a request for `identity` on the given route class.
    pub fn check(&self, identity: &str, class: RouteClass) -> Result<(), ProtectError> {
        self.check_at(identity, class, unix_seconds())
    }

    fn check_at(&self, identity: &str, class: RouteClass, now: u64) -> Result<(), ProtectError> {
        if !self.config.enabled {
            return Ok(());
        }

        let budget = self.config.budget(class);

        // The entry guard holds the shard lock, so the read-modify-write
        // below is atomic per key.
        let mut window = self
            .windows
            .entry((identity.to_string(), class))
            .or_insert(FixedWindow {
                window_start: now,
                count: 0,
            });

        if now.saturating_sub(window.window_start) >= budget.window_seconds {
            window.window_start = now;
            window.count = 0;
        }

        if window.count < budget.limit {
            window.count += 1;
            Ok(())
        } else {
            let retry_after = (window.window_start + budget.window_seconds)
                .saturating_sub(now)
                .max(1);
            Err(ProtectError::RateLimited { retry_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteBudget;
    use std::sync::Arc;

    fn limiter(limit: u32, window_seconds: u64) -> RateLimiter {
        let mut config = RateLimitConfig::default();
        config.stream = RouteBudget {
            limit,
            window_seconds,
        };
        RateLimiter::new(config)
    }

    #[test]
    fn test_sixth_request_denied() {
        let limiter = limiter(5, 60);

        for _ in 0..5 {
            assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_ok());
        }

        match limiter.check_at("u1", RouteClass::Stream, 100) {
            Err(ProtectError::RateLimited { retry_after }) => {
                assert!(retry_after >= 1 && retry_after <= 60);
            }
            other => panic!("expected rate limit denial, got {other:?}"),
        }
    }

    #[test]
    fn test_window_rollover_readmits() {
        let limiter = limiter(5, 60);

        for _ in 0..5 {
            assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_ok());
        }
        assert!(limiter.check_at("u1", RouteClass::Stream, 159).is_err());

        // Window elapsed: counter resets, request admitted.
        assert!(limiter.check_at("u1", RouteClass::Stream, 160).is_ok());
    }

    #[test]
    fn test_identities_isolated() {
        let limiter = limiter(1, 60);

        assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_ok());
        assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_err());
        assert!(limiter.check_at("u2", RouteClass::Stream, 100).is_ok());
    }

    #[test]
    fn test_route_classes_isolated() {
        let mut config = RateLimitConfig::default();
        config.stream = RouteBudget {
            limit: 1,
            window_seconds: 60,
        };
        config.token = RouteBudget {
            limit: 1,
            window_seconds: 60,
        };
        let limiter = RateLimiter::new(config);

        assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_ok());
        assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_err());
        // Exhausting the stream budget leaves the token budget intact.
        assert!(limiter.check_at("u1", RouteClass::Token, 100).is_ok());
    }

    #[test]
    fn test_disabled_admits_everything() {
        let mut config = RateLimitConfig::default();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..1000 {
            assert!(limiter.check_at("u1", RouteClass::Stream, 100).is_ok());
        }
    }

    #[test]
    fn test_concurrent_burst_never_overcounts() {
        let limiter = Arc::new(limiter(5, 60));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                limiter.check_at("u1", RouteClass::Stream, 100).is_ok()
            }));
        }

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(allowed, 5);
    }
}
