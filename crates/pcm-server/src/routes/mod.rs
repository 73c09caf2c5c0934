//! Route definitions for the HTTP API.

pub mod health;
pub mod parts;
pub mod products;

use axum::Router;
use serde::Serialize;

use crate::state::AppState;

/// Response body shared by the `/v4` routes.
#[derive(Debug, Serialize)]
pub struct Envelope<T, M> {
    pub data: T,
    pub metadata: M,
}

impl<T, M> Envelope<T, M> {
    pub fn new(data: T, metadata: M) -> Self {
        Self { data, metadata }
    }
}

/// Payload of count endpoints.
#[derive(Debug, Serialize)]
pub struct CountData {
    pub count: u64,
}

/// Build the complete router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(parts::routes())
        .merge(products::routes())
        .with_state(state)
}
