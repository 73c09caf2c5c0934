//! Request and row types for the storage layer.
//!
//! Requests arrive as JSON (opaque rule filters included) and are converted
//! into BSON query inputs here; aggregation output rows are converted back
//! into the domain types of `pcm-core`.

use mongodb::bson::{self, Bson, Document};
use pcm_core::{AvailabilityChannel, HasPart, PartTypeCount, PriceAggregate, SortOrder};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::pipeline::{Projection, ProductsRulesQuery};

/// A rule-based product query as received from callers.
///
/// `rules` is a precomposed filter and is passed through uninterpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleQueryRequest {
    pub product_type: String,
    #[serde(default)]
    pub rules: serde_json::Value,
    #[serde(default)]
    pub projections: Option<serde_json::Value>,
    #[serde(default)]
    pub availability_name: Option<String>,
    #[serde(default)]
    pub availability: Vec<AvailabilityChannel>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl RuleQueryRequest {
    /// Validate projections and rules and produce a plannable query.
    pub fn to_query(&self) -> StoreResult<ProductsRulesQuery> {
        Ok(ProductsRulesQuery {
            rules: rules_to_filter(&self.rules)?,
            projection: Projection::from_optional_value(self.projections.as_ref())?,
            availability_name: self
                .availability_name
                .clone()
                .filter(|name| !name.is_empty()),
            availability: self.availability.clone(),
            offset: self.offset,
            limit: self.limit,
            sort_order: self.sort_order,
        })
    }
}

/// Product type plus rule filter, for counts and price aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesRequest {
    pub product_type: String,
    #[serde(default)]
    pub rules: serde_json::Value,
}

/// Convert an opaque JSON rule filter to a BSON document.
///
/// `null` matches everything; anything other than an object is rejected.
pub fn rules_to_filter(rules: &serde_json::Value) -> StoreResult<Document> {
    match rules {
        serde_json::Value::Null => Ok(Document::new()),
        serde_json::Value::Object(_) => bson::to_document(rules)
            .map_err(|e| StoreError::InvalidQuery(format!("rules are not a valid filter: {}", e))),
        _ => Err(StoreError::InvalidQuery(
            "rules must be a JSON object".to_string(),
        )),
    }
}

/// Decode the `parts` array of an aggregation or find result.
///
/// Elements that are not documents are skipped.
pub fn parts_from_document(document: &Document) -> Vec<HasPart> {
    match document.get("parts") {
        Some(Bson::Array(items)) => items
            .iter()
            .filter_map(Bson::as_document)
            .map(|item| part_from_document(item.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode one element of a `parts` array.
///
/// A typed field is filled only when the stored value has the matching BSON
/// type. Everything else, mistyped or unmodelled, is kept in `extra` as
/// relaxed extended JSON under its stored key.
pub fn part_from_document(mut document: Document) -> HasPart {
    HasPart {
        id: take(&mut document, "_id", string),
        part_type: take(&mut document, "type", string),
        position: take(&mut document, "position", integer),
        is_free: take(&mut document, "isFree", Bson::as_bool),
        format: take(&mut document, "format", string),
        title: take(&mut document, "title", string),
        level: take(&mut document, "level", integer),
        page_start: document.remove("pageStart").map(Bson::into_relaxed_extjson),
        page_end: document.remove("pageEnd").map(Bson::into_relaxed_extjson),
        version: document.remove("version").map(Bson::into_relaxed_extjson),
        extra: document
            .into_iter()
            .map(|(key, value)| (key, value.into_relaxed_extjson()))
            .collect(),
    }
}

/// Remove `key` only if `convert` accepts its value.
fn take<T>(document: &mut Document, key: &str, convert: impl Fn(&Bson) -> Option<T>) -> Option<T> {
    let value = convert(document.get(key)?)?;
    document.remove(key);
    Some(value)
}

fn string(value: &Bson) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

/// Length of a document's `parts` array, `0` when absent.
pub fn parts_len(document: Option<&Document>) -> u64 {
    document
        .and_then(|d| d.get_array("parts").ok())
        .map_or(0, |parts| parts.len() as u64)
}

fn number(value: Option<&Bson>) -> Option<f64> {
    match value? {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Decode one `{_id: <type>, count}` row of a per-type count.
pub fn part_type_count_from_row(row: &Document) -> PartTypeCount {
    PartTypeCount {
        part_type: row.get_str("_id").ok().map(str::to_string),
        count: number(row.get("count")).map_or(0, |n| n as u64),
    }
}

/// Decode one reshaped price aggregation row.
pub fn price_aggregate_from_row(row: &Document) -> PriceAggregate {
    PriceAggregate {
        currency: row.get_str("currency").unwrap_or_default().to_string(),
        price_type_code: row.get_str("priceTypeCode").unwrap_or_default().to_string(),
        price: number(row.get("price")).unwrap_or(0.0),
        product_count: number(row.get("productCount")).map_or(0, |n| n as u64),
    }
}
