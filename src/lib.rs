//! Content-access protection edge for audio streaming.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                 STREAMGATE                      │
//!                    │                                                 │
//!   Token request    │  ┌──────┐   ┌────────────────────────────┐     │
//!   ─────────────────┼─▶│ http │──▶│ edge: capability → rate    │     │
//!                    │  └──────┘   │       → abuse → token.issue│     │
//!                    │             └────────────┬───────────────┘     │
//!                    │                          │                      │
//!   Chunk request    │  ┌──────┐   ┌────────────▼───────────────┐     │
//!   ─────────────────┼─▶│ http │──▶│ edge: capability → rate    │     │
//!                    │  └──────┘   │   → abuse → token.verify   │     │
//!   Bytes + mark     │             │   → cipher.decrypt         │     │
//!   ◀────────────────┼─────────────│   → watermark.mark         │     │
//!                    │             └────────────────────────────┘     │
//!                    │                                                 │
//!                    │  ┌──────────────────────────────────────────┐  │
//!                    │  │          Cross-Cutting Concerns           │  │
//!                    │  │  ┌────────┐ ┌────────┐ ┌─────────────┐   │  │
//!                    │  │  │ config │ │ events │ │observability│   │  │
//!                    │  │  └────────┘ └────────┘ └─────────────┘   │  │
//!                    │  │  ┌─────────┐ ┌──────────────────────┐    │  │
//!                    │  │  │ catalog │ │      lifecycle       │    │  │
//!                    │  │  └─────────┘ └──────────────────────┘    │  │
//!                    │  └──────────────────────────────────────────┘  │
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! Every denial is typed, mapped to a status code, and emitted as a
//! security event; secrets stay process-wide and immutable.

// Core subsystems
pub mod config;
pub mod edge;
pub mod http;
pub mod protect;

// Collaborator boundaries
pub mod catalog;
pub mod events;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::EdgeConfig;
pub use edge::StreamingEdge;
pub use error::ProtectError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
