//! Parts routes.
//!
//! - GET /v4/products/{id}/parts - Page through a parent's parts
//! - GET /v4/products/{id}/parts/count - Count a parent's parts
//! - GET /v4/products/{id}/parts/type-counts - Count parts per child type
//! - GET /v4/products/{id}/parts/revisions/{revision} - One stored revision
//! - GET /v4/products/{id}/parts/{part_id} - One part

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use pcm_core::{HasPart, PartTypeCount, PartsRevision};
use pcm_store::Projection;

use crate::error::{ApiError, ApiResult};
use crate::routes::{CountData, Envelope};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /v4/products/{id}/parts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub part_type: Option<String>,
    pub format: Option<String>,
    /// Comma-separated field paths, e.g. `parts._id,parts.type`.
    pub projections: Option<String>,
}

impl PartsParams {
    fn projection(&self) -> Projection {
        self.projections
            .as_deref()
            .map(Projection::from_csv)
            .unwrap_or_default()
    }
}

/// Query parameters for GET /v4/products/{id}/parts/count.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountParams {
    pub part_type: Option<String>,
    pub format: Option<String>,
}

/// Metadata for a page of parts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsMetadata {
    pub product_id: String,
    /// Number of parts in this page.
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Metadata for single-parent lookups.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentMetadata {
    pub product_id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ParentMetadata {
    fn new(product_id: String) -> Self {
        Self {
            product_id,
            part_type: None,
            format: None,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /v4/products/{id}/parts - Page through a parent's parts.
///
/// # Query Parameters
///
/// - `offset`, `limit`: Paging over the stored part order; `0` means unset
/// - `partType`: Child type, matched case-insensitively
/// - `format`: Exact format; for `creativeWork` the joined work's format
/// - `projections`: Comma-separated field paths to return
///
/// # Response
///
/// - 200 OK: `{ "data": [...parts], "metadata": { "count": 2, ... } }`
/// - 500 Internal Server Error: `We are unable to find the parts.`
///
/// A missing parent is an empty page, not a 404.
async fn get_parts(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<PartsParams>,
) -> ApiResult<Json<Envelope<Vec<HasPart>, PartsMetadata>>> {
    let parts = state
        .parts()
        .get_has_parts(
            &product_id,
            params.offset,
            params.limit,
            &params.projection(),
            params.part_type.as_deref(),
            params.format.as_deref(),
        )
        .await?
        .unwrap_or_default();

    tracing::info!(
        product_id = %product_id,
        count = parts.len(),
        part_type = ?params.part_type,
        format = ?params.format,
        "Parts page served"
    );

    let metadata = PartsMetadata {
        product_id,
        count: parts.len(),
        offset: params.offset,
        limit: params.limit,
        part_type: params.part_type,
        format: params.format,
    };
    Ok(Json(Envelope::new(parts, metadata)))
}

/// GET /v4/products/{id}/parts/count - Count a parent's parts.
///
/// # Response
///
/// - 200 OK: `{ "data": { "count": 8 }, "metadata": { "productId": "..." } }`
async fn get_parts_count(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<CountParams>,
) -> ApiResult<Json<Envelope<CountData, ParentMetadata>>> {
    let count = state
        .parts()
        .get_has_parts_count(
            &product_id,
            params.part_type.as_deref(),
            params.format.as_deref(),
        )
        .await?;

    let metadata = ParentMetadata {
        part_type: params.part_type,
        format: params.format,
        ..ParentMetadata::new(product_id)
    };
    Ok(Json(Envelope::new(CountData { count }, metadata)))
}

/// GET /v4/products/{id}/parts/type-counts - Count parts per child type.
///
/// # Response
///
/// - 200 OK: `{ "data": [{ "type": "chapter", "count": 3 }], "metadata": {...} }`
async fn get_type_counts(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Envelope<Vec<PartTypeCount>, ParentMetadata>>> {
    let counts = state.parts().get_all_parts_count(&product_id).await?;
    Ok(Json(Envelope::new(counts, ParentMetadata::new(product_id))))
}

/// GET /v4/products/{id}/parts/revisions/{revision} - One stored revision.
///
/// # Response
///
/// - 200 OK: the revision with its added, removed and updated parts
/// - 404 Not Found: No such revision
async fn get_parts_revision(
    State(state): State<AppState>,
    Path((product_id, revision)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<PartsRevision, ParentMetadata>>> {
    let found = state
        .parts()
        .get_parts_revision(&product_id, &revision)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "revision {} of parts for {}",
                revision, product_id
            ))
        })?;
    Ok(Json(Envelope::new(found, ParentMetadata::new(product_id))))
}

/// GET /v4/products/{id}/parts/{part_id} - One part of a parent.
///
/// # Response
///
/// - 200 OK: the part
/// - 404 Not Found: Parent missing or part not in it
/// - 500 Internal Server Error: `We are unable to find the part.`
async fn get_part(
    State(state): State<AppState>,
    Path((product_id, part_id)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<HasPart, ParentMetadata>>> {
    let part = state
        .parts()
        .get_part(&product_id, &part_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("part {} of {}", part_id, product_id)))?;
    Ok(Json(Envelope::new(part, ParentMetadata::new(product_id))))
}

/// Build parts routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v4/products/{id}/parts", get(get_parts))
        .route("/v4/products/{id}/parts/count", get(get_parts_count))
        .route("/v4/products/{id}/parts/type-counts", get(get_type_counts))
        .route(
            "/v4/products/{id}/parts/revisions/{revision}",
            get(get_parts_revision),
        )
        .route("/v4/products/{id}/parts/{part_id}", get(get_part))
}

// ============================================================================
// Tests
// ============================================================================
