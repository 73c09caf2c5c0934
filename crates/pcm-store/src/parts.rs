//! Data access for a parent's composed parts.
//!
//! `PartsDao` answers slice, count and lookup questions about the `parts`
//! array of a parent product. Absence is never an error here: a missing
//! parent yields `None`, an empty list, or a count of zero. Any store failure
//! is logged and replaced by a `QueryFailure` carrying a fixed message.

use mongodb::bson::{self, Bson, doc};
use pcm_core::{HasPart, PartTypeCount, PartsRevision};

use crate::error::{PART_QUERY_FAILED, PARTS_QUERY_FAILED, StoreError, StoreResult};
use crate::models::{part_from_document, part_type_count_from_row, parts_from_document, parts_len};
use crate::pipeline::{
    FindQuery, PARTS_COLLECTION, PARTS_REVISIONS_COLLECTION, PartsQuery, Projection, Stage,
    build_all_parts_count_query, build_part_query,
};
use crate::store::DocumentStore;

/// Log a store failure and replace it with the fixed-message failure.
fn failure(message: &'static str, product_id: &str) -> impl FnOnce(StoreError) -> StoreError {
    let product_id = product_id.to_string();
    move |e| {
        tracing::error!(error = %e, product_id = %product_id, "{}", message);
        StoreError::query_failure(message)
    }
}

/// Parts queries over any [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct PartsDao<S> {
    store: S,
}

impl<S: DocumentStore> PartsDao<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// A page of a parent's parts, optionally filtered by type and format.
    ///
    /// Returns `None` when the parent does not exist or every part was
    /// filtered out. Order is the stored array order.
    pub async fn get_has_parts(
        &self,
        product_id: &str,
        offset: Option<i64>,
        limit: Option<i64>,
        projection: &Projection,
        part_type: Option<&str>,
        format: Option<&str>,
    ) -> StoreResult<Option<Vec<HasPart>>> {
        let query = PartsQuery {
            product_id,
            offset,
            limit,
            part_type,
            format,
        };
        let mut stages = query.build();
        if !projection.is_empty() {
            stages.push(Stage::Project(projection.to_document()));
        }
        tracing::debug!(product_id, stages = stages.len(), "Querying has-parts");

        let rows = self
            .store
            .aggregate(PARTS_COLLECTION, stages)
            .await
            .map_err(failure(PARTS_QUERY_FAILED, product_id))?;

        Ok(rows.first().map(parts_from_document))
    }

    /// Number of a parent's parts matching the optional filters.
    ///
    /// Without filters the parent is read directly; with filters the count
    /// comes from the filtered pipeline. A missing parent counts as zero.
    pub async fn get_has_parts_count(
        &self,
        product_id: &str,
        part_type: Option<&str>,
        format: Option<&str>,
    ) -> StoreResult<u64> {
        let query = PartsQuery {
            product_id,
            part_type,
            format,
            ..PartsQuery::default()
        };

        let rows = if query.is_filtered() {
            self.store.aggregate(PARTS_COLLECTION, query.build()).await
        } else {
            let find = FindQuery::new(doc! { "_id": product_id })
                .with_projection(Some(doc! { "parts": 1 }));
            self.store.find(PARTS_COLLECTION, find).await
        }
        .map_err(failure(PARTS_QUERY_FAILED, product_id))?;

        Ok(parts_len(rows.first()))
    }

    /// Count of a parent's parts per child type.
    pub async fn get_all_parts_count(&self, product_id: &str) -> StoreResult<Vec<PartTypeCount>> {
        let rows = self
            .store
            .aggregate(PARTS_COLLECTION, build_all_parts_count_query(product_id))
            .await
            .map_err(failure(PARTS_QUERY_FAILED, product_id))?;

        Ok(rows.iter().map(part_type_count_from_row).collect())
    }

    /// One part of a parent, by the child's id.
    pub async fn get_part(&self, product_id: &str, part_id: &str) -> StoreResult<Option<HasPart>> {
        let rows = self
            .store
            .aggregate(PARTS_COLLECTION, build_part_query(product_id, part_id))
            .await
            .map_err(failure(PART_QUERY_FAILED, product_id))?;

        Ok(rows
            .first()
            .and_then(|row| row.get_document("parts").ok())
            .map(|part| part_from_document(part.clone())))
    }

    /// A stored revision of a parent's parts, with its deltas.
    pub async fn get_parts_revision(
        &self,
        product_id: &str,
        revision: &str,
    ) -> StoreResult<Option<PartsRevision>> {
        let filter = doc! { "parentId": product_id, "revision": revision };
        let found = self
            .store
            .find_one(PARTS_REVISIONS_COLLECTION, filter, None)
            .await
            .map_err(failure(PARTS_QUERY_FAILED, product_id))?;

        let Some(mut document) = found else {
            return Ok(None);
        };
        let parts = document
            .remove("parts")
            .map(|parts| parts_from_document(&doc! { "parts": parts }))
            .unwrap_or_default();
        let mut revision = bson::from_bson::<PartsRevision>(Bson::Document(document))
            .map_err(|e| failure(PARTS_QUERY_FAILED, product_id)(e.into()))?;
        revision.parts = parts;
        Ok(Some(revision))
    }
}
