//! Request orchestration for the protection edge.
//!
//! # Gate Pipeline
//! ```text
//! Received → CapabilityChecked → RateChecked → AbuseChecked
//!          → TokenValidated → Served
//! ```
//! Transitions are strictly sequential; the first failing gate is
//! terminal and skips all remaining work, so a request that fails a
//! cheap check never reaches decryption.
//!
//! # Design Decisions
//! - Every denial emits exactly one security event; served requests
//!   emit one only in audit-all mode
//! - All collaborators are constructor-injected so the edge is testable
//!   without a running server

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use crate::catalog::TrackCatalog;
use crate::config::EdgeConfig;
use crate::error::ProtectError;
use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventSink};
use crate::observability::metrics;
use crate::protect::abuse::AbuseDetector;
use crate::protect::capability;
use crate::protect::cipher::PayloadCipher;
use crate::protect::rate_limit::{RateLimiter, RouteClass};
use crate::protect::token::{Permission, TokenCodec};
use crate::protect::watermark::{Watermark, Watermarker};
use crate::protect::{resolve_secret, SecretError};

/// Per-request caller context assembled by the transport layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Key scoping rate and abuse state: API key name, or client IP
    /// for unauthenticated callers.
    pub identity: String,
    pub ip: String,
    pub user_agent: String,
    pub endpoint: &'static str,
    pub request_id: String,
    /// Scopes granted to the presented API key (empty when unknown).
    pub scopes: Vec<Permission>,
}

/// Token issuance request body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub track_id: String,
    pub user_id: String,
    #[serde(default)]
    pub permissions: Option<Vec<Permission>>,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// Issued token returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TokenGrant {
    pub token: String,
    pub expires_in: u64,
    pub track_id: String,
}

/// A decrypted, watermarked chunk ready to stream.
#[derive(Debug)]
pub struct ServedChunk {
    pub bytes: Vec<u8>,
    pub watermark: Watermark,
}

/// Orchestrates the protection gates in front of the byte-serving path.
pub struct StreamingEdge {
    tokens: TokenCodec,
    cipher: PayloadCipher,
    watermarker: Watermarker,
    rate_limiter: RateLimiter,
    abuse: AbuseDetector,
    catalog: Arc<dyn TrackCatalog>,
    events: SecurityEventSink,
    default_ttl_secs: u64,
    audit_all: bool,
}

impl StreamingEdge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tokens: TokenCodec,
        cipher: PayloadCipher,
        watermarker: Watermarker,
        rate_limiter: RateLimiter,
        abuse: AbuseDetector,
        catalog: Arc<dyn TrackCatalog>,
        events: SecurityEventSink,
        default_ttl_secs: u64,
        audit_all: bool,
    ) -> Self {
        Self {
            tokens,
            cipher,
            watermarker,
            rate_limiter,
            abuse,
            catalog,
            events,
            default_ttl_secs,
            audit_all,
        }
    }

    /// Build the edge and its event pipeline from configuration.
    ///
    /// Returns the consumer end of the security event channel for the
    /// caller to attach to a writer task.
    pub fn from_config(
        config: &EdgeConfig,
        catalog: Arc<dyn TrackCatalog>,
    ) -> Result<(Self, mpsc::Receiver<SecurityEvent>), SecretError> {
        let signing_secret = resolve_secret(config.token.signing_secret.as_deref())?;
        let root_secret = resolve_secret(config.cipher.root_secret.as_deref())?;
        let watermark_key = blake3::derive_key(
            crate::protect::watermark::WATERMARK_KEY_CONTEXT,
            &root_secret,
        );

        let (events, events_rx) = SecurityEventSink::bounded(config.events.buffer_size);

        let edge = Self::new(
            TokenCodec::new(signing_secret, config.token.default_ttl_secs),
            PayloadCipher::new(root_secret),
            Watermarker::new(watermark_key),
            RateLimiter::new(config.rate_limit.clone()),
            AbuseDetector::new(config.abuse.clone()),
            catalog,
            events,
            config.token.default_ttl_secs,
            config.events.audit_all,
        );
        Ok((edge, events_rx))
    }

    /// Issue an access token after the caller clears every gate.
    pub fn issue_token(
        &self,
        ctx: &RequestContext,
        request: &TokenRequest,
    ) -> Result<TokenGrant, ProtectError> {
        let permissions = request
            .permissions
            .clone()
            .unwrap_or_else(|| vec![Permission::Stream]);

        // 1. Capability: the key must hold every permission it mints.
        capability::authorize(&ctx.scopes, &permissions)
            .map_err(|e| self.deny(ctx, e, json!({ "track_id": request.track_id })))?;

        // 2. Rate budget for the token route.
        self.rate_limiter
            .check(&ctx.identity, RouteClass::Token)
            .map_err(|e| self.deny(ctx, e, json!({ "route": "token" })))?;

        // 3. Abuse heuristics over recent activity.
        let verdict = self
            .abuse
            .evaluate(&ctx.identity, &request.track_id, &ctx.ip, None);
        if let Some(reason) = verdict.reason.filter(|_| verdict.is_abusive) {
            let err = ProtectError::AbuseDetected { reason };
            return Err(self.deny(ctx, err, json!({ "track_id": request.track_id })));
        }

        // 4. Sign the claims.
        let token = self
            .tokens
            .issue(
                &request.track_id,
                &request.user_id,
                permissions,
                request.ttl_seconds,
            )
            .map_err(|e| self.deny(ctx, e, json!({ "track_id": request.track_id })))?;

        let expires_in = request.ttl_seconds.unwrap_or(self.default_ttl_secs);
        if self.audit_all {
            self.events.emit(self.event(
                ctx,
                SecurityEventKind::TokenIssued,
                json!({ "track_id": request.track_id, "expires_in": expires_in }),
            ));
        }

        Ok(TokenGrant {
            token,
            expires_in,
            track_id: request.track_id.clone(),
        })
    }

    /// Serve one decrypted, watermarked chunk.
    pub fn fetch_chunk(
        &self,
        ctx: &RequestContext,
        track_id: &str,
        chunk_index: u32,
        token: &str,
    ) -> Result<ServedChunk, ProtectError> {
        let metadata = json!({ "track_id": track_id, "chunk_index": chunk_index });

        // 1. Capability.
        capability::authorize(&ctx.scopes, &[Permission::Stream])
            .map_err(|e| self.deny(ctx, e, metadata.clone()))?;

        // 2. Rate budget for the stream route.
        self.rate_limiter
            .check(&ctx.identity, RouteClass::Stream)
            .map_err(|e| self.deny(ctx, e, metadata.clone()))?;

        // 3. Abuse heuristics, chunk-aware.
        let verdict =
            self.abuse
                .evaluate(&ctx.identity, track_id, &ctx.ip, Some(chunk_index));
        if let Some(reason) = verdict.reason.filter(|_| verdict.is_abusive) {
            let err = ProtectError::AbuseDetected { reason };
            return Err(self.deny(ctx, err, metadata));
        }

        // 4. Token: signature, expiry, permission, track binding.
        let claims = self
            .tokens
            .verify(token)
            .map_err(|e| self.deny(ctx, e, metadata.clone()))?;
        if !claims.allows(Permission::Stream) || claims.track_id != track_id {
            return Err(self.deny(ctx, ProtectError::InsufficientScope, metadata));
        }

        // 5. Catalog: missing or unstreamable is NotFound regardless of
        // token validity.
        let entry = self
            .catalog
            .lookup(track_id)
            .filter(|entry| entry.streamable)
            .ok_or_else(|| self.deny(ctx, ProtectError::NotFound, metadata.clone()))?;
        let encrypted = entry
            .chunks
            .get(chunk_index as usize)
            .ok_or_else(|| self.deny(ctx, ProtectError::NotFound, metadata.clone()))?;

        // 6. Decrypt and watermark.
        let bytes = self.cipher.decrypt(track_id, encrypted).map_err(|e| {
            tracing::error!(
                track_id = %track_id,
                chunk_index,
                request_id = %ctx.request_id,
                "Chunk failed authenticated decryption"
            );
            self.deny(ctx, e, metadata.clone())
        })?;
        let watermark = self.watermarker.mark(&claims.user_id, track_id);

        if self.audit_all {
            self.events.emit(self.event(
                ctx,
                SecurityEventKind::ChunkServed,
                json!({
                    "track_id": track_id,
                    "chunk_index": chunk_index,
                    "watermark": watermark.digest,
                }),
            ));
        }

        Ok(ServedChunk { bytes, watermark })
    }

    /// Resolve a denial: emit its security event, record the metric,
    /// and hand the error back to the caller.
    fn deny(
        &self,
        ctx: &RequestContext,
        err: ProtectError,
        mut metadata: serde_json::Value,
    ) -> ProtectError {
        if let Some(object) = metadata.as_object_mut() {
            object.insert("reason".to_string(), json!(err.to_string()));
        }
        let kind = err.event_kind();
        metrics::record_denial(kind.as_str());
        tracing::warn!(
            kind = kind.as_str(),
            identity = %ctx.identity,
            endpoint = ctx.endpoint,
            request_id = %ctx.request_id,
            "Request denied"
        );
        self.events.emit(self.event(ctx, kind, metadata));
        err
    }

    fn event(
        &self,
        ctx: &RequestContext,
        kind: SecurityEventKind,
        metadata: serde_json::Value,
    ) -> SecurityEvent {
        SecurityEvent::new(
            kind,
            ctx.identity.clone(),
            ctx.ip.clone(),
            ctx.user_agent.clone(),
            ctx.endpoint,
            ctx.request_id.clone(),
            metadata,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, TrackEntry};
    use crate::config::{AbuseConfig, RateLimitConfig, RouteBudget};
    use crate::events::SecurityEventKind;

    const SIGNING: [u8; 32] = [1u8; 32];
    const ROOT: [u8; 32] = [2u8; 32];

    fn build_edge(
        rate_limit: RateLimitConfig,
        audit_all: bool,
    ) -> (StreamingEdge, mpsc::Receiver<SecurityEvent>) {
        let cipher = PayloadCipher::new(ROOT);
        let catalog = MemoryCatalog::new();
        catalog.insert(
            "t1",
            TrackEntry {
                streamable: true,
                chunks: vec![
                    cipher.encrypt("t1", b"chunk zero").unwrap(),
                    cipher.encrypt("t1", b"chunk one").unwrap(),
                ],
            },
        );
        catalog.insert(
            "t2",
            TrackEntry {
                streamable: false,
                chunks: vec![],
            },
        );

        let (events, events_rx) = SecurityEventSink::bounded(64);
        let edge = StreamingEdge::new(
            TokenCodec::new(SIGNING, 3600),
            PayloadCipher::new(ROOT),
            Watermarker::new([3u8; 32]),
            RateLimiter::new(rate_limit),
            AbuseDetector::new(AbuseConfig::default()),
            Arc::new(catalog),
            events,
            3600,
            audit_all,
        );
        (edge, events_rx)
    }

    fn ctx(scopes: Vec<Permission>) -> RequestContext {
        RequestContext {
            identity: "mobile-app".to_string(),
            ip: "10.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
            endpoint: "/v1/tokens",
            request_id: "req-1".to_string(),
            scopes,
        }
    }

    fn token_request() -> TokenRequest {
        TokenRequest {
            track_id: "t1".to_string(),
            user_id: "u1".to_string(),
            permissions: None,
            ttl_seconds: Some(60),
        }
    }

    #[tokio::test]
    async fn test_issue_then_fetch() {
        let (edge, _rx) = build_edge(RateLimitConfig::default(), false);
        let ctx = ctx(vec![Permission::Stream]);

        let grant = edge.issue_token(&ctx, &token_request()).unwrap();
        assert_eq!(grant.expires_in, 60);
        assert_eq!(grant.track_id, "t1");

        let chunk = edge.fetch_chunk(&ctx, "t1", 0, &grant.token).unwrap();
        assert_eq!(chunk.bytes, b"chunk zero");
        assert_eq!(chunk.watermark.digest.len(), 16);
    }

    #[tokio::test]
    async fn test_missing_scope_denied_with_event() {
        let (edge, mut rx) = build_edge(RateLimitConfig::default(), false);
        let ctx = ctx(vec![]);

        let err = edge.issue_token(&ctx, &token_request()).unwrap_err();
        assert_eq!(err, ProtectError::InsufficientScope);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, SecurityEventKind::CapabilityDenied);
        assert_eq!(event.identity_key, "mobile-app");
    }

    #[tokio::test]
    async fn test_rate_limit_denies_with_retry_after() {
        let mut rate_limit = RateLimitConfig::default();
        rate_limit.token = RouteBudget {
            limit: 2,
            window_seconds: 60,
        };
        let (edge, mut rx) = build_edge(rate_limit, false);
        let ctx = ctx(vec![Permission::Stream]);

        assert!(edge.issue_token(&ctx, &token_request()).is_ok());
        assert!(edge.issue_token(&ctx, &token_request()).is_ok());

        match edge.issue_token(&ctx, &token_request()).unwrap_err() {
            ProtectError::RateLimited { retry_after } => assert!(retry_after <= 60),
            other => panic!("expected rate limit, got {other:?}"),
        }

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, SecurityEventKind::RateLimited);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_before_decryption() {
        let (edge, mut rx) = build_edge(RateLimitConfig::default(), false);
        let ctx = ctx(vec![Permission::Stream]);

        let err = edge.fetch_chunk(&ctx, "t1", 0, "garbage").unwrap_err();
        assert_eq!(err, ProtectError::Malformed);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, SecurityEventKind::TokenRejected);
    }

    #[tokio::test]
    async fn test_token_bound_to_track() {
        let (edge, _rx) = build_edge(RateLimitConfig::default(), false);
        let ctx = ctx(vec![Permission::Stream]);

        let grant = edge.issue_token(&ctx, &token_request()).unwrap();
        // t1 token presented against t2.
        let err = edge.fetch_chunk(&ctx, "t2", 0, &grant.token).unwrap_err();
        assert_eq!(err, ProtectError::InsufficientScope);
    }

    #[tokio::test]
    async fn test_preview_token_cannot_stream() {
        let (edge, _rx) = build_edge(RateLimitConfig::default(), false);
        let issuer = ctx(vec![Permission::Stream, Permission::DownloadPreview]);

        let request = TokenRequest {
            permissions: Some(vec![Permission::DownloadPreview]),
            ..token_request()
        };
        let grant = edge.issue_token(&issuer, &request).unwrap();

        let err = edge
            .fetch_chunk(&issuer, "t1", 0, &grant.token)
            .unwrap_err();
        assert_eq!(err, ProtectError::InsufficientScope);
    }

    #[tokio::test]
    async fn test_unknown_and_unstreamable_tracks_not_found() {
        let (edge, _rx) = build_edge(RateLimitConfig::default(), false);
        let ctx = ctx(vec![Permission::Stream]);

        let grant = edge
            .issue_token(
                &ctx,
                &TokenRequest {
                    track_id: "t2".to_string(),
                    ..token_request()
                },
            )
            .unwrap();
        // t2 exists but is not streamable.
        assert_eq!(
            edge.fetch_chunk(&ctx, "t2", 0, &grant.token).unwrap_err(),
            ProtectError::NotFound
        );

        let grant = edge.issue_token(&ctx, &token_request()).unwrap();
        // Chunk index past the end.
        assert_eq!(
            edge.fetch_chunk(&ctx, "t1", 99, &grant.token).unwrap_err(),
            ProtectError::NotFound
        );
    }

    #[tokio::test]
    async fn test_audit_all_emits_served_events() {
        let (edge, mut rx) = build_edge(RateLimitConfig::default(), true);
        let ctx = ctx(vec![Permission::Stream]);

        let grant = edge.issue_token(&ctx, &token_request()).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, SecurityEventKind::TokenIssued);

        edge.fetch_chunk(&ctx, "t1", 0, &grant.token).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, SecurityEventKind::ChunkServed);
    }

    #[tokio::test]
    async fn test_watermarks_differ_per_request() {
        let (edge, _rx) = build_edge(RateLimitConfig::default(), false);
        let ctx = ctx(vec![Permission::Stream]);

        let grant = edge.issue_token(&ctx, &token_request()).unwrap();
        let a = edge.fetch_chunk(&ctx, "t1", 0, &grant.token).unwrap();
        let b = edge.fetch_chunk(&ctx, "t1", 1, &grant.token).unwrap();
        assert_ne!(a.watermark.digest, b.watermark.digest);
    }
}
