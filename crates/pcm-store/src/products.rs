//! Data access for products selected by precomposed rule filters.

use mongodb::bson::{Document, doc};
use pcm_core::PriceAggregate;

use crate::error::{PRODUCTS_QUERY_FAILED, StoreError, StoreResult};
use crate::models::{RuleQueryRequest, price_aggregate_from_row, rules_to_filter};
use crate::pipeline::{
    PriceFilter, Projection, RulesQuery, build_price_query, prepare_products_rules_query,
};
use crate::registry::ModelRegistry;
use crate::store::DocumentStore;

fn failure(product_type: &str) -> impl FnOnce(StoreError) -> StoreError {
    let product_type = product_type.to_string();
    move |e| {
        tracing::error!(error = %e, product_type = %product_type, "{}", PRODUCTS_QUERY_FAILED);
        StoreError::query_failure(PRODUCTS_QUERY_FAILED)
    }
}

/// Product queries over any [`DocumentStore`].
///
/// Product types are resolved through a [`ModelRegistry`]; an unknown type
/// fails with `InvalidProductType` before any store call is made.
#[derive(Debug)]
pub struct ProductDao<S> {
    store: S,
    registry: ModelRegistry,
    price_filter: PriceFilter,
}

impl<S: DocumentStore> ProductDao<S> {
    pub fn new(store: S) -> Self {
        Self::with_price_filter(store, PriceFilter::default())
    }

    pub fn with_price_filter(store: S, price_filter: PriceFilter) -> Self {
        Self {
            store,
            registry: ModelRegistry::new(),
            price_filter,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn price_filter(&self) -> &PriceFilter {
        &self.price_filter
    }

    /// Products of `request.product_type` matching its rules.
    ///
    /// Sorted by `_id` in the requested direction. When availability channels
    /// are given, each product's `availability` is narrowed to those channels.
    pub async fn get_products_by_rule(
        &self,
        request: &RuleQueryRequest,
    ) -> StoreResult<Vec<Document>> {
        let model = self.registry.model(&request.product_type)?;
        let query = request.to_query()?;

        let result = match prepare_products_rules_query(&query) {
            RulesQuery::Find(find) => {
                tracing::debug!(collection = model.collection, "Finding products by rules");
                self.store.find(model.collection, find).await
            }
            RulesQuery::Aggregate(stages) => {
                tracing::debug!(
                    collection = model.collection,
                    stages = stages.len(),
                    "Aggregating products by rules"
                );
                self.store.aggregate(model.collection, stages).await
            }
        };
        result.map_err(failure(&request.product_type))
    }

    /// Number of products of `product_type` matching `rules`.
    pub async fn get_products_count_by_rules(
        &self,
        product_type: &str,
        rules: &serde_json::Value,
    ) -> StoreResult<u64> {
        let model = self.registry.model(product_type)?;
        let filter = rules_to_filter(rules)?;

        self.store
            .count(model.collection, filter)
            .await
            .map_err(failure(product_type))
    }

    /// Summed prices of matching products, per currency and price type.
    pub async fn get_products_price_by_rules(
        &self,
        product_type: &str,
        rules: &serde_json::Value,
    ) -> StoreResult<Vec<PriceAggregate>> {
        let model = self.registry.model(product_type)?;
        let filter = rules_to_filter(rules)?;

        let rows = self
            .store
            .aggregate(model.collection, build_price_query(filter, &self.price_filter))
            .await
            .map_err(failure(product_type))?;

        Ok(rows.iter().map(price_aggregate_from_row).collect())
    }

    /// A single product by id.
    pub async fn get_product(
        &self,
        product_type: &str,
        id: &str,
        projection: &Projection,
    ) -> StoreResult<Option<Document>> {
        let model = self.registry.model(product_type)?;

        self.store
            .find_one(model.collection, doc! { "_id": id }, projection.to_optional_document())
            .await
            .map_err(failure(product_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;
    use serde_json::json;

    async fn seeded() -> ProductDao<MemoryStore> {
        let store = MemoryStore::new();
        store
            .insert_many(
                "books",
                vec![
                    doc! { "_id": "B1", "title": "One", "subject": "maths" },
                    doc! { "_id": "B2", "title": "Two", "subject": "maths" },
                    doc! { "_id": "B3", "title": "Three", "subject": "art" },
                ],
            )
            .await;
        ProductDao::new(store)
    }

    #[tokio::test]
    async fn test_unknown_product_type_is_not_a_query_failure() {
        let dao = seeded().await;
        let request = RuleQueryRequest {
            product_type: "podcast".into(),
            ..RuleQueryRequest::default()
        };
        let err = dao.get_products_by_rule(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProductType);

        let err = dao
            .get_products_count_by_rules("podcast", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProductType);
    }

    #[tokio::test]
    async fn test_count_by_rules() {
        let dao = seeded().await;
        let count = dao
            .get_products_count_by_rules("Book", &json!({ "subject": "maths" }))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_get_product_with_projection() {
        let dao = seeded().await;
        let product = dao
            .get_product("book", "B3", &Projection::new(["subject"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product, doc! { "_id": "B3", "subject": "art" });
        assert!(
            dao.get_product("book", "B9", &Projection::default())
                .await
                .unwrap()
                .is_none()
        );
    }
}
