//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, handlers)
//!     → request.rs (request ID stamping)
//!     → edge (capability → rate → abuse → token → cipher → watermark)
//!     → response.rs (denials mapped to status codes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, RequestIdLayer, X_REQUEST_ID};
pub use server::{AppState, HttpServer, X_API_KEY};
