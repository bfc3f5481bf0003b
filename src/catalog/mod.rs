//! Track catalog boundary.
//!
//! The catalog of business entities lives elsewhere; this subsystem
//! only needs to know whether a track exists, whether it is
//! streamable, and where its encrypted chunks are.

use std::sync::Arc;

use dashmap::DashMap;

/// A track as seen by the protection edge.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    /// Whether the track may be streamed at all.
    pub streamable: bool,
    /// Encrypted chunks in playback order.
    pub chunks: Vec<Vec<u8>>,
}

/// Lookup interface supplied by the catalog collaborator.
///
/// A missing or unstreamable track denies the request regardless of
/// token validity.
pub trait TrackCatalog: Send + Sync {
    fn lookup(&self, track_id: &str) -> Option<Arc<TrackEntry>>;
}

/// In-memory catalog used for serving from process memory and in tests.
#[derive(Default)]
pub struct MemoryCatalog {
    tracks: DashMap<String, Arc<TrackEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, track_id: impl Into<String>, entry: TrackEntry) {
        self.tracks.insert(track_id.into(), Arc::new(entry));
    }
}

impl TrackCatalog for MemoryCatalog {
    fn lookup(&self, track_id: &str) -> Option<Arc<TrackEntry>> {
        self.tracks.get(track_id).map(|entry| entry.value().clone())
    }
}
