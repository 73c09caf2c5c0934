//! Core data types for the PCM API.
//!
//! This module defines the vocabulary shared by the store, the server and
//! the CLI:
//!
//! - The closed set of product types and the collection each one lives in
//! - The `HasPart` embedding carried by composite products
//! - Revision deltas for a parent's parts
//! - The reduced rows produced by count and price aggregations
//!
//! All wire-facing types serialize in camelCase with MongoDB's `_id` key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Product Types
// ============================================================================

/// The closed set of product types known to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductType {
    Book,
    Chapter,
    Collection,
    CreativeWork,
    ScholarlyArticle,
    Set,
    Series,
    Journal,
    PublishingService,
    Entry,
    EntryVersion,
    PreChapter,
}

impl ProductType {
    /// Every known product type, in declaration order.
    pub const ALL: [ProductType; 12] = [
        ProductType::Book,
        ProductType::Chapter,
        ProductType::Collection,
        ProductType::CreativeWork,
        ProductType::ScholarlyArticle,
        ProductType::Set,
        ProductType::Series,
        ProductType::Journal,
        ProductType::PublishingService,
        ProductType::Entry,
        ProductType::EntryVersion,
        ProductType::PreChapter,
    ];

    /// The canonical (camelCase) name stored in a document's `type` field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Chapter => "chapter",
            Self::Collection => "collection",
            Self::CreativeWork => "creativeWork",
            Self::ScholarlyArticle => "scholarlyArticle",
            Self::Set => "set",
            Self::Series => "series",
            Self::Journal => "journal",
            Self::PublishingService => "publishingService",
            Self::Entry => "entry",
            Self::EntryVersion => "entryVersion",
            Self::PreChapter => "preChapter",
        }
    }

    /// Name of the collection holding documents of this type.
    #[must_use]
    pub const fn collection_name(&self) -> &'static str {
        match self {
            Self::Book => "books",
            Self::Chapter => "chapters",
            Self::Collection => "collections",
            Self::CreativeWork => "creativeworks",
            Self::ScholarlyArticle => "scholarlyarticles",
            Self::Set => "sets",
            Self::Series => "series",
            Self::Journal => "journals",
            Self::PublishingService => "publishingservices",
            Self::Entry => "entries",
            Self::EntryVersion => "entryversions",
            Self::PreChapter => "prechapters",
        }
    }

    /// Whether products of this type carry a composed `parts` array.
    #[must_use]
    pub const fn supports_parts(&self) -> bool {
        matches!(self, Self::Book | Self::Chapter | Self::Collection)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known product type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown product type: {0}")]
pub struct UnknownProductType(pub String);

impl FromStr for ProductType {
    type Err = UnknownProductType;

    /// Parses a product type name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().to_ascii_lowercase() == lowered)
            .ok_or_else(|| UnknownProductType(s.to_string()))
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort direction for rule-based product queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// MongoDB sort direction: `1` ascending, `-1` descending.
    #[must_use]
    pub const fn direction(&self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

// ============================================================================
// Parts
// ============================================================================

/// A child product referenced from a composite parent's `parts` array.
///
/// Callers may project any subset of fields, so nothing is guaranteed,
/// not even `_id`. `format` is populated only for children of type
/// `creativeWork`, by joining against the creative work collection.
///
/// Page labels and versions are stored as strings or numbers depending on
/// the product, so they are carried as raw JSON values. Fields without a
/// typed slot are kept in `extra` and serialized back alongside the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasPart {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_start: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_end: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HasPart {
    /// The `_id`, or `""` when it was projected away.
    #[must_use]
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Render a loosely typed label (page number, version) for display.
#[must_use]
pub fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One entry of a revision delta, keyed by `_id` + `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDelta {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A revision of a parent's parts, with the changes since the previous
/// revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsRevision {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: String,
    pub revision: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default)]
    pub parts: Vec<HasPart>,
    #[serde(default)]
    pub parts_added: Vec<PartDelta>,
    #[serde(default)]
    pub parts_removed: Vec<PartDelta>,
    #[serde(default)]
    pub parts_updated: Vec<PartDelta>,
}

/// Number of children of one type under a parent.
///
/// Reads `_id` (the aggregation's group key) as well as `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTypeCount {
    #[serde(rename = "type", alias = "_id")]
    pub part_type: Option<String>,
    pub count: u64,
}

// ============================================================================
// Products
// ============================================================================

/// A named distribution channel requested in a rule query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChannel {
    pub name: String,
}

/// Sum of matching prices for one currency and price type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAggregate {
    pub currency: String,
    pub price_type_code: String,
    pub price: f64,
    pub product_count: u64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_type_parse_ignores_case() {
        assert_eq!("Chapter".parse::<ProductType>().unwrap(), ProductType::Chapter);
        assert_eq!("CREATIVEWORK".parse::<ProductType>().unwrap(), ProductType::CreativeWork);
        assert_eq!("entryVersion".parse::<ProductType>().unwrap(), ProductType::EntryVersion);
    }

    #[test]
    fn test_product_type_parse_unknown() {
        let err = "podcast".parse::<ProductType>().unwrap_err();
        assert_eq!(err, UnknownProductType("podcast".to_string()));
    }

    #[test]
    fn test_product_type_names_round_trip() {
        for t in ProductType::ALL {
            assert_eq!(t.as_str().parse::<ProductType>().unwrap(), t);
        }
    }

    #[test]
    fn test_collection_names_are_lowercase_and_unique() {
        let mut names: Vec<_> = ProductType::ALL.iter().map(|t| t.collection_name()).collect();
        assert!(names.iter().all(|n| n.chars().all(|c| c.is_ascii_lowercase())));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ProductType::ALL.len());
    }

    #[test]
    fn test_supports_parts() {
        assert!(ProductType::Book.supports_parts());
        assert!(ProductType::Collection.supports_parts());
        assert!(!ProductType::Journal.supports_parts());
    }

    #[test]
    fn test_product_type_serde() {
        let json = serde_json::to_string(&ProductType::ScholarlyArticle).unwrap();
        assert_eq!(json, "\"scholarlyArticle\"");
    }

    #[test]
    fn test_sort_order_default_is_desc() {
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        assert_eq!(SortOrder::Asc.direction(), 1);
        assert_eq!(SortOrder::Desc.direction(), -1);
        let parsed: SortOrder = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(parsed, SortOrder::Asc);
    }

    #[test]
    fn test_has_part_wire_format() {
        let json = r#"{"_id":"c1","type":"chapter","position":3,"isFree":true,"pageStart":"xi"}"#;
        let part: HasPart = serde_json::from_str(json).unwrap();
        assert_eq!(part.id.as_deref(), Some("c1"));
        assert_eq!(part.part_type.as_deref(), Some("chapter"));
        assert_eq!(part.position, Some(3));
        assert_eq!(part.is_free, Some(true));
        assert_eq!(part.page_start, Some(Value::from("xi")));
        assert!(part.format.is_none());
        assert!(part.extra.is_empty());

        let out = serde_json::to_value(&part).unwrap();
        assert_eq!(out["_id"], "c1");
        assert!(out.get("format").is_none());
    }

    #[test]
    fn test_has_part_numeric_pages_and_unmodelled_fields() {
        let json = r#"{"_id":"c1","pageStart":1,"pageEnd":20,"version":2,"doi":"10.1/x"}"#;
        let part: HasPart = serde_json::from_str(json).unwrap();
        assert_eq!(part.page_start, Some(Value::from(1)));
        assert_eq!(label_text(part.page_end.as_ref().unwrap()), "20");
        assert_eq!(part.extra.get("doi"), Some(&Value::from("10.1/x")));

        let out = serde_json::to_value(&part).unwrap();
        assert_eq!(out["doi"], "10.1/x");
        assert_eq!(out["version"], 2);
    }

    #[test]
    fn test_has_part_without_id_omits_it() {
        let part = HasPart {
            title: Some("T".into()),
            ..HasPart::default()
        };
        assert_eq!(part.id_str(), "");
        let out = serde_json::to_string(&part).unwrap();
        assert_eq!(out, r#"{"title":"T"}"#);
    }

    #[test]
    fn test_part_type_count_reads_group_key() {
        let row: PartTypeCount = serde_json::from_str(r#"{"_id":"chapter","count":3}"#).unwrap();
        assert_eq!(row.part_type.as_deref(), Some("chapter"));
        assert_eq!(row.count, 3);
        let out = serde_json::to_string(&row).unwrap();
        assert!(out.contains("\"type\":\"chapter\""));
    }

    #[test]
    fn test_parts_revision_defaults_empty_deltas() {
        let json = r#"{"_id":"r1","parentId":"p1","revision":"2"}"#;
        let rev: PartsRevision = serde_json::from_str(json).unwrap();
        assert_eq!(rev.parent_id, "p1");
        assert!(rev.parts_added.is_empty());
        assert!(rev.parts_removed.is_empty());
        assert!(rev.parts_updated.is_empty());
    }
}
