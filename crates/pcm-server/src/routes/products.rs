//! Product routes.
//!
//! - GET /v4/products/{id} - One product by id and type
//! - POST /v4/products/rules - Products matching a rule filter
//! - POST /v4/products/rules/count - Count of products matching a rule filter
//! - POST /v4/products/rules/prices - Price totals of matching products

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use pcm_core::{PriceAggregate, SortOrder};
use pcm_store::{Projection, RuleQueryRequest, RulesRequest};

use crate::error::{ApiError, ApiResult};
use crate::routes::{CountData, Envelope};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /v4/products/{id}.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductParams {
    pub product_type: String,
    /// Comma-separated field paths.
    pub projections: Option<String>,
}

/// Metadata for product responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsMetadata {
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl ProductsMetadata {
    fn new(product_type: impl Into<String>) -> Self {
        Self {
            product_type: product_type.into(),
            count: None,
            offset: None,
            limit: None,
            sort_order: None,
        }
    }
}

/// Render a stored document as relaxed extended JSON.
fn to_json(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /v4/products/{id} - One product.
///
/// # Query Parameters
///
/// - `productType`: Required; selects the collection
/// - `projections`: Comma-separated field paths to return
///
/// # Response
///
/// - 200 OK: `{ "data": {...product}, "metadata": { "type": "book" } }`
/// - 400 Bad Request: Unknown product type
/// - 404 Not Found: No product with this id
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ProductParams>,
) -> ApiResult<Json<Envelope<serde_json::Value, ProductsMetadata>>> {
    let projection = params
        .projections
        .as_deref()
        .map(Projection::from_csv)
        .unwrap_or_default();

    let product = state
        .products()
        .get_product(&params.product_type, &id, &projection)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {}", params.product_type, id)))?;

    Ok(Json(Envelope::new(
        to_json(product),
        ProductsMetadata::new(params.product_type),
    )))
}

/// POST /v4/products/rules - Products matching a rule filter.
///
/// # Request Body
///
/// ```json
/// {
///   "productType": "book",
///   "rules": { "subject": "maths" },
///   "projections": ["title"],
///   "availability": [{ "name": "UBX" }],
///   "offset": 0,
///   "limit": 20,
///   "sortOrder": "asc"
/// }
/// ```
///
/// # Response
///
/// - 200 OK: `{ "data": [...products], "metadata": { "count": 20, ... } }`
/// - 400 Bad Request: Unknown product type, bad projections or rules
/// - 500 Internal Server Error: `We are unable to find the products.`
async fn get_products_by_rule(
    State(state): State<AppState>,
    Json(request): Json<RuleQueryRequest>,
) -> ApiResult<Json<Envelope<Vec<serde_json::Value>, ProductsMetadata>>> {
    let products = state.products().get_products_by_rule(&request).await?;

    tracing::info!(
        product_type = %request.product_type,
        count = products.len(),
        channels = request.availability.len(),
        "Rule query served"
    );

    let metadata = ProductsMetadata {
        count: Some(products.len()),
        offset: request.offset,
        limit: request.limit,
        sort_order: Some(request.sort_order),
        ..ProductsMetadata::new(request.product_type)
    };
    let data = products.into_iter().map(to_json).collect();
    Ok(Json(Envelope::new(data, metadata)))
}

/// POST /v4/products/rules/count - Count of products matching a rule filter.
///
/// # Response
///
/// - 200 OK: `{ "data": { "count": 42 }, "metadata": { "type": "book" } }`
async fn get_products_count_by_rules(
    State(state): State<AppState>,
    Json(request): Json<RulesRequest>,
) -> ApiResult<Json<Envelope<CountData, ProductsMetadata>>> {
    let count = state
        .products()
        .get_products_count_by_rules(&request.product_type, &request.rules)
        .await?;
    Ok(Json(Envelope::new(
        CountData { count },
        ProductsMetadata::new(request.product_type),
    )))
}

/// POST /v4/products/rules/prices - Price totals of matching products.
///
/// # Response
///
/// - 200 OK: `{ "data": [{ "currency": "GBP", "priceTypeCode": "BYO",
///   "price": 30.0, "productCount": 2 }], "metadata": {...} }`
async fn get_products_price_by_rules(
    State(state): State<AppState>,
    Json(request): Json<RulesRequest>,
) -> ApiResult<Json<Envelope<Vec<PriceAggregate>, ProductsMetadata>>> {
    let prices = state
        .products()
        .get_products_price_by_rules(&request.product_type, &request.rules)
        .await?;

    let metadata = ProductsMetadata {
        count: Some(prices.len()),
        ..ProductsMetadata::new(request.product_type)
    };
    Ok(Json(Envelope::new(prices, metadata)))
}

/// Build product routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v4/products/{id}", get(get_product))
        .route("/v4/products/rules", post(get_products_by_rule))
        .route("/v4/products/rules/count", post(get_products_count_by_rules))
        .route("/v4/products/rules/prices", post(get_products_price_by_rules))
}

// ============================================================================
// Tests
// ============================================================================
