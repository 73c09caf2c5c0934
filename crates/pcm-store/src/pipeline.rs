//! Query and aggregation-pipeline construction.
//!
//! Everything in this module is a pure function of its inputs: the same
//! parameters always produce the same stage sequence, so pipeline shapes are
//! unit-tested without a live store.
//!
//! Parts pipelines are assembled from a fixed, ordered table of guarded stage
//! constructors. Each constructor inspects the query and contributes zero or
//! more stages; the table order is the stage order.

use mongodb::bson::{Bson, Document, doc};
use pcm_core::{AvailabilityChannel, ProductType, SortOrder};

use crate::error::{StoreError, StoreResult};

/// Collection holding each parent's composed parts, keyed by parent id.
pub const PARTS_COLLECTION: &str = "parts";

/// Collection holding revisions of a parent's parts.
pub const PARTS_REVISIONS_COLLECTION: &str = "partsrevisions";

/// Field the creative work lookup is joined into.
const CREATIVE_WORK_JOIN: &str = "creativeWork";

// ============================================================================
// Stages
// ============================================================================

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// `$match` with a query filter.
    Match(Document),
    /// `$unwind` of an array field (path given without the leading `$`).
    Unwind(String),
    /// `$lookup` left-join against another collection.
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// `$addFields` with computed values.
    AddFields(Document),
    /// `$project` with inclusions and computed values.
    Project(Document),
    /// `$sort` by the given keys.
    Sort(Document),
    /// `$skip` this many rows.
    Skip(i64),
    /// `$limit` to this many rows.
    Limit(i64),
    /// `$group` by an `_id` expression with accumulators.
    Group(Document),
}

impl Stage {
    /// Render the stage in MongoDB's pipeline syntax.
    pub fn to_document(&self) -> Document {
        match self {
            Self::Match(filter) => doc! { "$match": filter.clone() },
            Self::Unwind(path) => doc! { "$unwind": format!("${}", path) },
            Self::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => doc! {
                "$lookup": {
                    "from": from.as_str(),
                    "localField": local_field.as_str(),
                    "foreignField": foreign_field.as_str(),
                    "as": as_field.as_str(),
                }
            },
            Self::AddFields(fields) => doc! { "$addFields": fields.clone() },
            Self::Project(fields) => doc! { "$project": fields.clone() },
            Self::Sort(keys) => doc! { "$sort": keys.clone() },
            Self::Skip(n) => doc! { "$skip": *n },
            Self::Limit(n) => doc! { "$limit": *n },
            Self::Group(spec) => doc! { "$group": spec.clone() },
        }
    }

    /// Stage operator name, e.g. `"$match"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Unwind(_) => "$unwind",
            Self::Lookup { .. } => "$lookup",
            Self::AddFields(_) => "$addFields",
            Self::Project(_) => "$project",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Group(_) => "$group",
        }
    }
}

/// Render a whole pipeline in MongoDB's syntax.
pub fn to_pipeline(stages: &[Stage]) -> Vec<Document> {
    stages.iter().map(Stage::to_document).collect()
}

/// A plain filtered query with optional projection, sort and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl FindQuery {
    /// Query matching `filter` with no projection or paging.
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Restrict returned fields.
    pub fn with_projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }
}

// ============================================================================
// Projection Builder
// ============================================================================

/// An ordered list of dotted field paths to include in results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    /// Projection over the given field paths.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a projection from JSON input.
    ///
    /// Anything other than an array of strings is `InvalidProjection`.
    pub fn from_value(value: &serde_json::Value) -> StoreResult<Self> {
        let items = value.as_array().ok_or(StoreError::InvalidProjection)?;
        let fields = items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or(StoreError::InvalidProjection)?;
        Ok(Self { fields })
    }

    /// Parse an optional projection; absent or `null` means no fields.
    pub fn from_optional_value(value: Option<&serde_json::Value>) -> StoreResult<Self> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(v) => Self::from_value(v),
        }
    }

    /// Parse a comma-separated list (`"parts._id,parts.type"`).
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Inclusion map for this projection.
    pub fn to_document(&self) -> Document {
        build_projection(&self.fields)
    }

    /// Inclusion map, or `None` when no fields were requested.
    pub fn to_optional_document(&self) -> Option<Document> {
        (!self.is_empty()).then(|| self.to_document())
    }
}

/// Map each field path to inclusion flag `1`. Last write wins.
pub fn build_projection(fields: &[String]) -> Document {
    let mut projection = Document::new();
    for field in fields {
        projection.insert(field.as_str(), 1);
    }
    projection
}

// ============================================================================
// Type Filter Normalizer
// ============================================================================

/// Anchored, case-insensitive exact match for a type string.
pub fn type_filter(raw: &str) -> Document {
    doc! {
        "$regex": format!("^{}$", regex::escape(raw)),
        "$options": "i",
    }
}

// ============================================================================
// Parts Query Stage Builder
// ============================================================================

/// Parameters of a parts slice or count query.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartsQuery<'a> {
    pub product_id: &'a str,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub part_type: Option<&'a str>,
    pub format: Option<&'a str>,
}

type StageConstructor = fn(&PartsQuery<'_>) -> Vec<Stage>;

/// Parts pipeline, in stage order.
const PARTS_STAGES: [StageConstructor; 8] = [
    match_parent,
    unwind_parts,
    enrich_creative_work,
    filter_part_type,
    filter_format,
    skip_offset,
    limit_rows,
    group_parts,
];

impl<'a> PartsQuery<'a> {
    pub fn new(product_id: &'a str) -> Self {
        Self {
            product_id,
            ..Self::default()
        }
    }

    /// Requested part type, treating an empty string as absent.
    pub fn part_type(&self) -> Option<&'a str> {
        self.part_type.filter(|t| !t.is_empty())
    }

    /// Requested format, treating an empty string as absent.
    pub fn format(&self) -> Option<&'a str> {
        self.format.filter(|f| !f.is_empty())
    }

    /// Whether a type or format filter was requested.
    pub fn is_filtered(&self) -> bool {
        self.part_type().is_some() || self.format().is_some()
    }

    fn wants_creative_work(&self) -> bool {
        self.part_type() == Some(ProductType::CreativeWork.as_str())
    }

    /// Build the ordered stage list.
    pub fn build(&self) -> Vec<Stage> {
        PARTS_STAGES.iter().flat_map(|stage| stage(self)).collect()
    }
}

fn match_parent(q: &PartsQuery<'_>) -> Vec<Stage> {
    vec![Stage::Match(doc! { "_id": q.product_id })]
}

fn unwind_parts(_: &PartsQuery<'_>) -> Vec<Stage> {
    vec![Stage::Unwind("parts".to_string())]
}

fn enrich_creative_work(q: &PartsQuery<'_>) -> Vec<Stage> {
    if !q.wants_creative_work() {
        return Vec::new();
    }
    vec![
        Stage::Lookup {
            from: ProductType::CreativeWork.collection_name().to_string(),
            local_field: "parts._id".to_string(),
            foreign_field: "_id".to_string(),
            as_field: CREATIVE_WORK_JOIN.to_string(),
        },
        Stage::Unwind(CREATIVE_WORK_JOIN.to_string()),
        Stage::AddFields(doc! { "parts.format": format!("${}.format", CREATIVE_WORK_JOIN) }),
    ]
}

fn filter_part_type(q: &PartsQuery<'_>) -> Vec<Stage> {
    match q.part_type() {
        Some(t) if !q.wants_creative_work() => {
            vec![Stage::Match(doc! { "parts.type": type_filter(t) })]
        }
        _ => Vec::new(),
    }
}

fn filter_format(q: &PartsQuery<'_>) -> Vec<Stage> {
    q.format()
        .map(|f| vec![Stage::Match(doc! { "parts.format": f })])
        .unwrap_or_default()
}

// Zero means "not given"; any other value, negative included, is passed on.
fn skip_offset(q: &PartsQuery<'_>) -> Vec<Stage> {
    match q.offset {
        Some(n) if n != 0 => vec![Stage::Skip(n)],
        _ => Vec::new(),
    }
}

fn limit_rows(q: &PartsQuery<'_>) -> Vec<Stage> {
    match q.limit {
        Some(n) if n != 0 => vec![Stage::Limit(n)],
        _ => Vec::new(),
    }
}

fn group_parts(_: &PartsQuery<'_>) -> Vec<Stage> {
    vec![Stage::Group(doc! {
        "_id": Bson::Null,
        "parts": { "$push": "$parts" },
    })]
}

/// Stages selecting a slice of a parent's parts, optionally filtered.
pub fn build_parts_query(
    product_id: &str,
    offset: Option<i64>,
    limit: Option<i64>,
    part_type: Option<&str>,
    format: Option<&str>,
) -> Vec<Stage> {
    PartsQuery {
        product_id,
        offset,
        limit,
        part_type,
        format,
    }
    .build()
}

/// Stages counting a parent's parts per child type.
pub fn build_all_parts_count_query(product_id: &str) -> Vec<Stage> {
    vec![
        Stage::Match(doc! { "_id": product_id }),
        Stage::Unwind("parts".to_string()),
        Stage::Group(doc! {
            "_id": "$parts.type",
            "count": { "$sum": 1 },
        }),
    ]
}

/// Stages selecting one part of a parent by the child's id.
pub fn build_part_query(product_id: &str, part_id: &str) -> Vec<Stage> {
    vec![
        Stage::Match(doc! { "_id": product_id }),
        Stage::Unwind("parts".to_string()),
        Stage::Match(doc! { "parts._id": part_id }),
        Stage::Limit(1),
        Stage::Project(doc! { "_id": 0, "parts": 1 }),
    ]
}

// ============================================================================
// Rule-Based Product Query Planner
// ============================================================================

/// A validated rule query, ready for planning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductsRulesQuery {
    pub rules: Document,
    pub projection: Projection,
    pub availability_name: Option<String>,
    pub availability: Vec<AvailabilityChannel>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub sort_order: SortOrder,
}

/// The plan chosen for a rule query.
#[derive(Debug, Clone, PartialEq)]
pub enum RulesQuery {
    /// Plain filtered, projected, sorted and paged query.
    Find(FindQuery),
    /// Aggregation, needed to filter the availability array.
    Aggregate(Vec<Stage>),
}

const AVAILABILITY_FIELD: &str = "availability";

/// Projection without any path at or below `availability`.
fn projection_without_availability(projection: &Projection) -> Document {
    let nested = format!("{}.", AVAILABILITY_FIELD);
    let fields: Vec<String> = projection
        .fields()
        .iter()
        .filter(|f| f.as_str() != AVAILABILITY_FIELD && !f.starts_with(&nested))
        .cloned()
        .collect();
    build_projection(&fields)
}

fn truthy(value: Option<i64>) -> Option<i64> {
    value.filter(|n| *n != 0)
}

/// Choose and build the query for a rule-based product lookup.
///
/// A non-empty `availability` list needs an aggregation so the array can be
/// filtered down to the requested channels; everything else is a plain find.
pub fn prepare_products_rules_query(query: &ProductsRulesQuery) -> RulesQuery {
    let sort = doc! { "_id": query.sort_order.direction() };

    if !query.availability.is_empty() {
        let names: Vec<Bson> = query
            .availability
            .iter()
            .map(|c| Bson::String(c.name.clone()))
            .collect();

        let mut project = projection_without_availability(&query.projection);
        project.insert(
            AVAILABILITY_FIELD,
            doc! {
                "$filter": {
                    "input": format!("${}", AVAILABILITY_FIELD),
                    "as": AVAILABILITY_FIELD,
                    "cond": { "$in": [format!("$${}.name", AVAILABILITY_FIELD), names] },
                }
            },
        );

        let mut stages = vec![
            Stage::Match(query.rules.clone()),
            Stage::Project(project),
            Stage::Sort(sort),
        ];
        if let Some(n) = truthy(query.offset) {
            stages.push(Stage::Skip(n));
        }
        if let Some(n) = truthy(query.limit) {
            stages.push(Stage::Limit(n));
        }
        return RulesQuery::Aggregate(stages);
    }

    let projection = match &query.availability_name {
        Some(name) => {
            let mut projection = projection_without_availability(&query.projection);
            projection.insert(
                AVAILABILITY_FIELD,
                doc! { "$elemMatch": { "name": name.as_str() } },
            );
            Some(projection)
        }
        None => query.projection.to_optional_document(),
    };

    RulesQuery::Find(FindQuery {
        filter: query.rules.clone(),
        projection,
        sort: Some(sort),
        skip: truthy(query.offset),
        limit: truthy(query.limit),
    })
}

// ============================================================================
// Price Aggregation
// ============================================================================

/// Which prices take part in a price aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFilter {
    pub price_type_codes: Vec<String>,
    pub currencies: Vec<String>,
}

impl Default for PriceFilter {
    fn default() -> Self {
        Self {
            price_type_codes: vec!["BYO".to_string()],
            currencies: vec!["GBP".to_string(), "USD".to_string()],
        }
    }
}

/// Stages summing matching products' prices per currency and price type.
pub fn build_price_query(rules: Document, filter: &PriceFilter) -> Vec<Stage> {
    let codes: Vec<Bson> = filter
        .price_type_codes
        .iter()
        .map(|c| Bson::String(c.clone()))
        .collect();
    let currencies: Vec<Bson> = filter
        .currencies
        .iter()
        .map(|c| Bson::String(c.clone()))
        .collect();

    vec![
        Stage::Match(rules),
        Stage::Project(doc! {
            "prices": {
                "$filter": {
                    "input": "$prices",
                    "as": "price",
                    "cond": {
                        "$and": [
                            { "$in": ["$$price.priceTypeCode", codes] },
                            { "$in": ["$$price.currency", currencies] },
                        ]
                    },
                }
            }
        }),
        Stage::Unwind("prices".to_string()),
        Stage::Group(doc! {
            "_id": {
                "currency": "$prices.currency",
                "priceTypeCode": "$prices.priceTypeCode",
            },
            "price": { "$sum": "$prices.price" },
            "productCount": { "$sum": 1 },
        }),
        Stage::Project(doc! {
            "_id": 0,
            "currency": "$_id.currency",
            "priceTypeCode": "$_id.priceTypeCode",
            "price": 1,
            "productCount": 1,
        }),
        Stage::Sort(doc! { "currency": 1, "priceTypeCode": 1 }),
    ]
}

// ============================================================================
// Tests
// ============================================================================
