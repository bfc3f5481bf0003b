//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use streamgate::catalog::{MemoryCatalog, TrackEntry};
use streamgate::config::{ApiKeyConfig, EdgeConfig};
use streamgate::http::HttpServer;
use streamgate::lifecycle::Shutdown;
use streamgate::protect::cipher::PayloadCipher;
use streamgate::protect::token::Permission;

/// Root secret shared by the test server and the test catalog.
pub const ROOT_SECRET: [u8; 32] = [0xAA; 32];

/// API key recognized by the test server.
pub const API_KEY: &str = "sg_test_key";

/// Base config: fixed secrets, one API key, metrics off.
pub fn test_config() -> EdgeConfig {
    let mut config = EdgeConfig::default();
    config.token.signing_secret = Some("bb".repeat(32));
    config.cipher.root_secret = Some(hex::encode(ROOT_SECRET));
    config.api_keys.push(ApiKeyConfig {
        name: "test-client".to_string(),
        key: API_KEY.to_string(),
        scopes: vec![Permission::Stream, Permission::DownloadPreview],
    });
    config.observability.metrics_enabled = false;
    config
}

/// Catalog holding one streamable track with the given plain chunks,
/// encrypted the way the ingest collaborator would.
pub fn test_catalog(track_id: &str, plain_chunks: &[&[u8]]) -> Arc<MemoryCatalog> {
    let cipher = PayloadCipher::new(ROOT_SECRET);
    let chunks = plain_chunks
        .iter()
        .map(|chunk| cipher.encrypt(track_id, chunk).unwrap())
        .collect();

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.insert(
        track_id,
        TrackEntry {
            streamable: true,
            chunks,
        },
    );
    catalog
}

/// Start the edge on an ephemeral port.
///
/// The returned `Shutdown` must stay alive for the server's lifetime.
pub async fn start_edge(config: EdgeConfig, catalog: Arc<MemoryCatalog>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, catalog).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for the listener to start serving.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown)
}
