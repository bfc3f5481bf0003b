//! Per-request watermarks for leak attribution.
//!
//! # Design Decisions
//! - Keyed one-way digest over user, track, and a nanosecond timestamp:
//!   two requests for the same content carry different marks, and the
//!   mark alone cannot be reversed to a user id without the out-of-band
//!   mapping held by the attribution store
//! - Fixed 16-hex-character output for every input

use crate::protect::unix_nanos;

/// Rendered watermark length in hex characters.
const DIGEST_LEN: usize = 16;

/// Domain separation for the watermark key.
pub const WATERMARK_KEY_CONTEXT: &str = "streamgate v1 watermark key";

/// An ephemeral attribution marker for one served chunk.
///
/// Returned to the caller in response metadata; never persisted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub user_id: String,
    pub track_id: String,
    pub timestamp_nanos: u128,
    pub digest: String,
}

/// Derives watermarks binding a user, a track, and an instant.
pub struct Watermarker {
    key: [u8; 32],
}

impl Watermarker {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Produce a watermark for the current instant.
    pub fn mark(&self, user_id: &str, track_id: &str) -> Watermark {
        self.mark_at(user_id, track_id, unix_nanos())
    }

    fn mark_at(&self, user_id: &str, track_id: &str, instant_nanos: u128) -> Watermark {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        // Zero separators keep (user, track) pairs unambiguous.
        hasher.update(user_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(track_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(&instant_nanos.to_le_bytes());

        let digest = hasher.finalize().to_hex()[..DIGEST_LEN].to_string();
        Watermark {
            user_id: user_id.to_string(),
            track_id: track_id.to_string(),
            timestamp_nanos: instant_nanos,
            digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> Watermarker {
        Watermarker::new([9u8; 32])
    }

    #[test]
    fn test_distinct_instants_distinct_marks() {
        let marker = marker();
        let a = marker.mark_at("u1", "t1", 1_000);
        let b = marker.mark_at("u1", "t1", 1_001);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_constant_length() {
        let marker = marker();
        for (user, track) in [("u", "t"), ("user-with-long-id", "track-9999"), ("", "")] {
            let mark = marker.mark(user, track);
            assert_eq!(mark.digest.len(), DIGEST_LEN);
        }
    }

    #[test]
    fn test_same_inputs_same_instant_deterministic() {
        let marker = marker();
        let a = marker.mark_at("u1", "t1", 5_000);
        let b = marker.mark_at("u1", "t1", 5_000);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn test_field_boundaries_unambiguous() {
        let marker = marker();
        let a = marker.mark_at("ab", "c", 1);
        let b = marker.mark_at("a", "bc", 1);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_key_matters() {
        let a = Watermarker::new([1u8; 32]).mark_at("u1", "t1", 1);
        let b = Watermarker::new([2u8; 32]).mark_at("u1", "t1", 1);
        assert_ne!(a.digest, b.digest);
    }
}
