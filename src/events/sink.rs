//! Non-blocking delivery of security events to the external sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::events::SecurityEvent;
use crate::observability::metrics;

/// Producer half of the security event pipeline.
///
/// Cheap to clone; every handler task holds one.
#[derive(Clone)]
pub struct SecurityEventSink {
    tx: mpsc::Sender<SecurityEvent>,
    dropped: Arc<AtomicU64>,
}

impl SecurityEventSink {
    /// Create a sink with a bounded buffer, returning the consumer end.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<SecurityEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Emit an event without ever blocking the request path.
    ///
    /// Under backpressure the event is dropped and counted rather than
    /// stalling the response.
    pub fn emit(&self, event: SecurityEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_event_dropped();
        }
    }

    /// Number of events dropped under backpressure so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawn the consumer task that forwards events to the log sink.
///
/// Drains any buffered events before exiting on shutdown.
pub fn spawn_writer(
    mut rx: mpsc::Receiver<SecurityEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => write_event(&event),
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    while let Ok(event) = rx.try_recv() {
                        write_event(&event);
                    }
                    break;
                }
            }
        }
        tracing::debug!("Security event writer stopped");
    })
}

fn write_event(event: &SecurityEvent) {
    metrics::record_security_event(event.kind.as_str());
    tracing::warn!(
        kind = event.kind.as_str(),
        identity = %event.identity_key,
        ip = %event.ip,
        user_agent = %event.user_agent,
        endpoint = %event.endpoint,
        request_id = %event.request_id,
        metadata = %event.metadata,
        "security_event"
    );
}
