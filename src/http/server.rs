//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Assemble per-request caller context (identity, IP, user agent)
//! - Dispatch requests to the streaming edge
//! - Run the security event writer alongside the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::catalog::TrackCatalog;
use crate::config::EdgeConfig;
use crate::edge::{RequestContext, StreamingEdge, TokenGrant, TokenRequest};
use crate::error::ProtectError;
use crate::events::{self, SecurityEvent};
use crate::http::request::{request_id, RequestIdLayer};
use crate::observability::metrics;
use crate::protect::capability::ApiKeyDirectory;
use crate::protect::SecretError;

/// Header carrying the caller's API key.
pub const X_API_KEY: &str = "x-api-key";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub edge: Arc<StreamingEdge>,
    pub keys: Arc<ApiKeyDirectory>,
}

/// HTTP server for the protection edge.
pub struct HttpServer {
    router: Router,
    events_rx: mpsc::Receiver<SecurityEvent>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(
        config: EdgeConfig,
        catalog: Arc<dyn TrackCatalog>,
    ) -> Result<Self, SecretError> {
        let (edge, events_rx) = StreamingEdge::from_config(&config, catalog)?;
        let keys = Arc::new(ApiKeyDirectory::from_config(&config.api_keys));

        let state = AppState {
            edge: Arc::new(edge),
            keys,
        };
        let router = Self::build_router(&config, state);

        Ok(Self { router, events_rx })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        Router::new()
            .route("/v1/tokens", post(issue_token))
            .route(
                "/v1/tracks/{track_id}/chunks/{chunk_index}",
                get(fetch_chunk),
            )
            .route("/health", get(health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Security events drain on their own task for the server's
        // whole lifetime.
        let writer = events::spawn_writer(self.events_rx, shutdown.resubscribe());

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        let _ = writer.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}

/// Assemble the caller context shared by every gate.
fn request_context(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
    endpoint: &'static str,
) -> RequestContext {
    let ip = addr.ip().to_string();
    let (identity, scopes) = match headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .and_then(|key| state.keys.resolve(key))
    {
        Some(identity) => (identity.name.clone(), identity.scopes.clone()),
        // Unknown callers keep an empty scope set and are keyed by IP;
        // the capability gate turns that into a denial.
        None => (ip.clone(), Vec::new()),
    };

    RequestContext {
        identity,
        ip,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        endpoint,
        request_id: request_id(headers),
        scopes,
    }
}

/// Token issuance endpoint.
async fn issue_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenGrant>, ProtectError> {
    let start = Instant::now();
    let ctx = request_context(&state, &headers, addr, "/v1/tokens");

    tracing::debug!(
        request_id = %ctx.request_id,
        identity = %ctx.identity,
        track_id = %request.track_id,
        "Token requested"
    );

    let result = state.edge.issue_token(&ctx, &request);
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    metrics::record_request("/v1/tokens", status.as_u16(), start);

    result.map(Json)
}

/// Chunk retrieval endpoint.
async fn fetch_chunk(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((track_id, chunk_index)): Path<(String, u32)>,
    headers: HeaderMap,
) -> Result<Response, ProtectError> {
    let start = Instant::now();
    let ctx = request_context(&state, &headers, addr, "/v1/tracks/chunks");

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    let result = state.edge.fetch_chunk(&ctx, &track_id, chunk_index, token);
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    metrics::record_request("/v1/tracks/chunks", status.as_u16(), start);

    let chunk = result?;

    let mut response = Response::new(Body::from(chunk.bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&chunk.watermark.digest) {
        headers.insert("x-watermark", value);
    }
    Ok(response)
}

/// Liveness probe.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
