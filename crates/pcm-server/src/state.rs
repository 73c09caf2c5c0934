//! Application state shared across handlers.

use std::sync::Arc;

use pcm_store::{PartsDao, ProductDao, StoreBackend};

use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// This is cloneable and can be extracted in handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Parts queries.
    parts: Arc<PartsDao<StoreBackend>>,
    /// Product and rule queries, with their model registry.
    products: Arc<ProductDao<StoreBackend>>,
    /// Server configuration.
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Create new application state over a store backend.
    pub fn new(store: StoreBackend, config: ServerConfig) -> Self {
        Self {
            parts: Arc::new(PartsDao::new(store.clone())),
            products: Arc::new(ProductDao::new(store)),
            config: Arc::new(config),
        }
    }

    /// Get a reference to the parts DAO.
    pub fn parts(&self) -> &PartsDao<StoreBackend> {
        &self.parts
    }

    /// Get a reference to the product DAO.
    pub fn products(&self) -> &ProductDao<StoreBackend> {
        &self.products
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Name of the active store backend.
    pub fn backend_name(&self) -> &'static str {
        self.parts.store().name()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
