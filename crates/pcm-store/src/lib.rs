//! pcm-store: Query layer for the Product Content Management API
//!
//! This crate provides:
//! - Typed aggregation stages and the parts pipeline builder
//! - The rule-based product query planner (find vs. aggregate)
//! - DAOs that execute those plans and reduce results
//! - A MongoDB backend and an in-process backend behind one trait
//!
//! # Architecture
//!
//! Builders in [`pipeline`] are pure: they turn request parameters into
//! [`Stage`] lists or [`FindQuery`] values. The DAOs ([`PartsDao`],
//! [`ProductDao`]) hand those to a [`DocumentStore`] and translate store
//! failures into fixed-message query failures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pcm_store::{MongoStore, PartsDao, Projection, StoreConfig};
//!
//! let store = MongoStore::connect(StoreConfig::from_env()?).await?;
//! let parts = PartsDao::new(store);
//!
//! let page = parts
//!     .get_has_parts("9781000000001", Some(10), Some(5), &Projection::default(), Some("chapter"), None)
//!     .await?;
//! ```

pub mod error;
pub mod eval;
pub mod memory;
pub mod models;
pub mod parts;
pub mod pipeline;
pub mod products;
pub mod registry;
pub mod store;

pub use error::{
    ErrorKind, PART_QUERY_FAILED, PARTS_QUERY_FAILED, PRODUCTS_QUERY_FAILED, StoreError,
    StoreResult,
};
pub use memory::MemoryStore;
pub use models::{RuleQueryRequest, RulesRequest};
pub use parts::PartsDao;
pub use pipeline::{
    FindQuery, PartsQuery, PriceFilter, ProductsRulesQuery, Projection, RulesQuery, Stage,
    build_all_parts_count_query, build_part_query, build_parts_query, build_price_query,
    build_projection, prepare_products_rules_query, type_filter,
};
pub use products::ProductDao;
pub use registry::{ModelRegistry, ProductModel};
pub use store::{DocumentStore, MongoStore, StoreBackend, StoreConfig};

// Re-export pcm-core for downstream crates
pub use pcm_core;
