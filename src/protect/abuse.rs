//! Heuristic abuse classification over recent streaming activity.
//!
//! # Heuristics
//! Each is independently sufficient to flag:
//! - velocity: too many requests for one track in a short window
//! - impossible concurrency: one identity streaming from materially
//!   different network origins at once
//! - pattern repetition: the same chunk re-requested faster than
//!   playback allows
//!
//! # Design Decisions
//! - The detector only classifies; the caller decides the consequence
//! - History is a bounded per-identity ring: oldest attempts evicted
//!   past a fixed capacity or a fixed time horizon, whichever is hit
//!   first
//! - All thresholds come from configuration, not hardcoded rules

use std::collections::VecDeque;
use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::AbuseConfig;
use crate::protect::unix_millis;

/// Why a request pattern was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbuseReason {
    Velocity,
    ImpossibleConcurrency,
    PatternRepetition,
}

impl AbuseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbuseReason::Velocity => "velocity",
            AbuseReason::ImpossibleConcurrency => "impossible-concurrency",
            AbuseReason::PatternRepetition => "pattern-repetition",
        }
    }
}

impl fmt::Display for AbuseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one streaming attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbuseVerdict {
    pub is_abusive: bool,
    pub reason: Option<AbuseReason>,
}

impl AbuseVerdict {
    fn clean() -> Self {
        Self {
            is_abusive: false,
            reason: None,
        }
    }

    fn flagged(reason: AbuseReason) -> Self {
        Self {
            is_abusive: true,
            reason: Some(reason),
        }
    }
}

/// One recorded streaming attempt.
struct Attempt {
    at_millis: u64,
    track_id: String,
    origin: String,
    chunk_index: Option<u32>,
}

/// Bounded recent history for one identity.
#[derive(Default)]
struct History {
    attempts: VecDeque<Attempt>,
}

/// Classifies streaming attempts against recent per-identity history.
pub struct AbuseDetector {
    histories: DashMap<String, History>,
    config: AbuseConfig,
}

impl AbuseDetector {
    pub fn new(config: AbuseConfig) -> Self {
        Self {
            histories: DashMap::new(),
            config,
        }
    }

    /// Record an attempt and classify it.
    ///
    /// `origin` is the requester's network origin (client IP);
    /// `chunk_index` is present for chunk retrievals and absent for
    /// token issuance.
    pub fn evaluate(
        &self,
        identity: &str,
        track_id: &str,
        origin: &str,
        chunk_index: Option<u32>,
    ) -> AbuseVerdict {
        self.evaluate_at(identity, track_id, origin, chunk_index, unix_millis())
    }

    fn evaluate_at(
        &self,
        identity: &str,
        track_id: &str,
        origin: &str,
        chunk_index: Option<u32>,
        now_millis: u64,
    ) -> AbuseVerdict {
        let mut history = self.histories.entry(identity.to_string()).or_default();

        history.attempts.push_back(Attempt {
            at_millis: now_millis,
            track_id: track_id.to_string(),
            origin: origin.to_string(),
            chunk_index,
        });
        self.evict(&mut history, now_millis);

        if let Some(reason) = self.classify(&history, track_id, chunk_index, now_millis) {
            return AbuseVerdict::flagged(reason);
        }
        AbuseVerdict::clean()
    }

    /// Drop attempts past the capacity or the time horizon.
    fn evict(&self, history: &mut History, now_millis: u64) {
        let horizon = self.config.history_horizon_secs * 1000;
        while history.attempts.len() > self.config.history_capacity {
            history.attempts.pop_front();
        }
        while let Some(front) = history.attempts.front() {
            if now_millis.saturating_sub(front.at_millis) > horizon {
                history.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    fn classify(
        &self,
        history: &History,
        track_id: &str,
        chunk_index: Option<u32>,
        now_millis: u64,
    ) -> Option<AbuseReason> {
        if self.velocity_exceeded(history, track_id, now_millis) {
            return Some(AbuseReason::Velocity);
        }
        if self.origins_conflict(history, now_millis) {
            return Some(AbuseReason::ImpossibleConcurrency);
        }
        if let Some(chunk) = chunk_index {
            if self.chunk_replayed(history, track_id, chunk, now_millis) {
                return Some(AbuseReason::PatternRepetition);
            }
        }
        None
    }

    /// More than `velocity_limit` requests for the same track within
    /// the velocity window.
    fn velocity_exceeded(&self, history: &History, track_id: &str, now_millis: u64) -> bool {
        let window = self.config.velocity_window_secs * 1000;
        let recent = history
            .attempts
            .iter()
            .filter(|a| a.track_id == track_id)
            .filter(|a| now_millis.saturating_sub(a.at_millis) <= window)
            .count();
        recent > self.config.velocity_limit
    }

    /// `origin_limit` or more distinct network origins within the
    /// origin window.
    fn origins_conflict(&self, history: &History, now_millis: u64) -> bool {
        let window = self.config.origin_window_secs * 1000;
        let mut origins: Vec<&str> = history
            .attempts
            .iter()
            .filter(|a| now_millis.saturating_sub(a.at_millis) <= window)
            .map(|a| a.origin.as_str())
            .collect();
        origins.sort_unstable();
        origins.dedup();
        origins.len() >= self.config.origin_limit
    }

    /// The same chunk re-requested more than `replay_limit` times
    /// within the replay window.
    fn chunk_replayed(
        &self,
        history: &History,
        track_id: &str,
        chunk: u32,
        now_millis: u64,
    ) -> bool {
        let window = self.config.replay_window_secs * 1000;
        let repeats = history
            .attempts
            .iter()
            .filter(|a| a.track_id == track_id && a.chunk_index == Some(chunk))
            .filter(|a| now_millis.saturating_sub(a.at_millis) <= window)
            .count();
        repeats > self.config.replay_limit
    }
}
