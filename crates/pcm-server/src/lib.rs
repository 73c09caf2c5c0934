//! pcm-server: HTTP API server for the Product Content Management API
//!
//! This crate provides:
//! - Parts endpoints (paging, counts, per-type counts, single parts, revisions)
//! - Product endpoints (single product, rule queries, rule counts, prices)
//! - JSON error responses with stable error codes
//!
//! # Architecture
//!
//! The server is built on Axum with a middleware stack for:
//! - Request tracing and logging
//! - CORS handling
//! - Request ID generation
//!
//! Handlers are thin: they parse parameters, call the DAOs in `pcm-store`
//! and wrap results as `{ "data": ..., "metadata": ... }`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pcm_server::{AppState, ServerConfig, app};
//! use pcm_store::{MemoryStore, StoreBackend};
//!
//! let state = AppState::new(StoreBackend::from(MemoryStore::new()), ServerConfig::default());
//! let router = app(state);
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

// Re-exports for convenience
pub use config::{ConfigError, Environment, ServerConfig, StoreBackendKind};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

// Re-export dependent crates
pub use pcm_core;
pub use pcm_store;

/// Router with request-id and tracing middleware applied.
///
/// CORS is left to the binary, which reads the allowed origins.
pub fn app(state: AppState) -> Router {
    routes::build_router(state)
        .layer(axum::middleware::from_fn(
            middleware::request_id::propagate_request_id,
        ))
        .layer(middleware::request_id::request_id_layer())
        .layer(TraceLayer::new_for_http())
}
