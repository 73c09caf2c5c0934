//! Lazily built per-product-type model handles.
//!
//! A [`ModelRegistry`] maps a caller-supplied product type string to the
//! [`ProductModel`] describing where documents of that type live. Handles are
//! created on first use and memoized under the lowercased type string, so
//! `"Book"`, `"book"` and `"BOOK"` share one handle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use pcm_core::ProductType;

use crate::error::{StoreError, StoreResult};

/// Where and how documents of one product type are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductModel {
    pub product_type: ProductType,
    pub collection: &'static str,
}

impl ProductModel {
    fn new(product_type: ProductType) -> Self {
        Self {
            product_type,
            collection: product_type.collection_name(),
        }
    }
}

/// Memoizing factory for [`ProductModel`] handles.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ProductModel>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model for `product_type`, creating it on first request.
    ///
    /// Fails with `InvalidProductType` for names outside the known set.
    pub fn model(&self, product_type: &str) -> StoreResult<Arc<ProductModel>> {
        let key = product_type.trim().to_ascii_lowercase();

        if let Some(model) = self.read_cached(&key) {
            return Ok(model);
        }

        let parsed: ProductType = key
            .parse()
            .map_err(|_| StoreError::InvalidProductType(product_type.to_string()))?;

        let mut models = self
            .models
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let model = models
            .entry(key)
            .or_insert_with(|| {
                tracing::debug!(product_type = %parsed, "Creating product model");
                Arc::new(ProductModel::new(parsed))
            })
            .clone();
        Ok(model)
    }

    /// Number of models created so far.
    pub fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_cached(&self, key: &str) -> Option<Arc<ProductModel>> {
        self.models
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }
}
