//! In-process document store.
//!
//! `MemoryStore` executes the same `FindQuery` and `Stage` values the DAOs
//! hand to MongoDB, using the evaluator in [`crate::eval`]. Collections keep
//! insertion order, and unwinding preserves array order, so paging over
//! parts behaves as it does against MongoDB.

use std::collections::HashMap;
use std::sync::Arc;

use mongodb::bson::{Bson, Document};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::eval::{self, Vars};
use crate::pipeline::{FindQuery, Stage};
use crate::store::DocumentStore;

/// Shared, cloneable in-memory collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one document to a collection.
    pub async fn insert_one(&self, collection: &str, document: Document) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    /// Append documents to a collection.
    pub async fn insert_many<I>(&self, collection: &str, documents: I)
    where
        I: IntoIterator<Item = Document>,
    {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    /// Number of documents held in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    async fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    async fn filtered(&self, collection: &str, filter: &Document) -> StoreResult<Vec<Document>> {
        let mut out = Vec::new();
        for doc in self.snapshot(collection).await {
            if eval::matches(&doc, filter)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    async fn run_stage(&self, rows: Vec<Document>, stage: &Stage) -> StoreResult<Vec<Document>> {
        match stage {
            Stage::Match(filter) => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    if eval::matches(&row, filter)? {
                        out.push(row);
                    }
                }
                Ok(out)
            }
            Stage::Unwind(path) => Ok(unwind(rows, path)),
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => {
                let foreign = self.snapshot(from).await;
                Ok(rows
                    .into_iter()
                    .map(|mut row| {
                        let joined = lookup(&row, &foreign, local_field, foreign_field);
                        eval::set_path(&mut row, as_field, Bson::Array(joined));
                        row
                    })
                    .collect())
            }
            Stage::AddFields(fields) => {
                let vars = Vars::new();
                let mut out = Vec::with_capacity(rows.len());
                for mut row in rows {
                    let source = row.clone();
                    for (path, expr) in fields {
                        if let Some(value) = eval::eval_expr(expr, &source, &vars)? {
                            eval::set_path(&mut row, path, value);
                        }
                    }
                    out.push(row);
                }
                Ok(out)
            }
            Stage::Project(spec) => rows.iter().map(|row| eval::project(row, spec)).collect(),
            Stage::Sort(keys) => Ok(sort(rows, keys)),
            Stage::Skip(n) => {
                let n = usize::try_from(*n)
                    .map_err(|_| StoreError::InvalidQuery("$skip must be non-negative".into()))?;
                Ok(rows.into_iter().skip(n).collect())
            }
            Stage::Limit(n) => {
                let n = usize::try_from(*n)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| StoreError::InvalidQuery("$limit must be positive".into()))?;
                Ok(rows.into_iter().take(n).collect())
            }
            Stage::Group(spec) => group(rows, spec),
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: FindQuery) -> StoreResult<Vec<Document>> {
        let mut rows = self.filtered(collection, &query.filter).await?;
        if let Some(keys) = &query.sort {
            rows = sort(rows, keys);
        }
        if let Some(n) = query.skip {
            let n = usize::try_from(n)
                .map_err(|_| StoreError::InvalidQuery("skip must be non-negative".into()))?;
            rows = rows.into_iter().skip(n).collect();
        }
        // A negative find limit means "at most |n|", as in MongoDB.
        if let Some(n) = query.limit.filter(|n| *n != 0) {
            rows.truncate(n.unsigned_abs() as usize);
        }
        match &query.projection {
            Some(spec) => rows.iter().map(|row| eval::project(row, spec)).collect(),
            None => Ok(rows),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        let first = self.filtered(collection, &filter).await?.into_iter().next();
        match (first, projection) {
            (Some(doc), Some(spec)) => Ok(Some(eval::project(&doc, &spec)?)),
            (first, None) => Ok(first),
            (None, _) => Ok(None),
        }
    }

    async fn aggregate(&self, collection: &str, stages: Vec<Stage>) -> StoreResult<Vec<Document>> {
        let mut rows = self.snapshot(collection).await;
        for stage in &stages {
            rows = self.run_stage(rows, stage).await?;
        }
        Ok(rows)
    }

    async fn count(&self, collection: &str, filter: Document) -> StoreResult<u64> {
        Ok(self.filtered(collection, &filter).await?.len() as u64)
    }
}

// ============================================================================
// Stage helpers
// ============================================================================

fn unwind(rows: Vec<Document>, path: &str) -> Vec<Document> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match eval::get_path(&Bson::Document(row.clone()), path) {
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut copy = row.clone();
                    eval::set_path(&mut copy, path, item);
                    out.push(copy);
                }
            }
            None | Some(Bson::Null) => {}
            Some(_) => out.push(row),
        }
    }
    out
}

fn lookup(row: &Document, foreign: &[Document], local_field: &str, foreign_field: &str) -> Vec<Bson> {
    let mut keys: Vec<Bson> = Vec::new();
    for value in eval::resolve_path(row, local_field) {
        match value {
            Bson::Array(items) => keys.extend(items),
            other => keys.push(other),
        }
    }
    if keys.is_empty() {
        keys.push(Bson::Null);
    }
    foreign
        .iter()
        .filter(|doc| {
            let values = eval::resolve_path(doc, foreign_field);
            keys.iter().any(|key| {
                if values.is_empty() {
                    return matches!(key, Bson::Null);
                }
                values.iter().any(|v| match v {
                    Bson::Array(items) => items.iter().any(|i| eval::values_equal(i, key)),
                    _ => eval::values_equal(v, key),
                })
            })
        })
        .cloned()
        .map(Bson::Document)
        .collect()
}

fn sort(mut rows: Vec<Document>, keys: &Document) -> Vec<Document> {
    let keys: Vec<(String, bool)> = keys
        .iter()
        .map(|(k, v)| (k.clone(), eval::compare_values(v, &Bson::Int32(0)) != Some(std::cmp::Ordering::Less)))
        .collect();
    rows.sort_by(|a, b| {
        for (path, ascending) in &keys {
            let x = eval::get_path(&Bson::Document(a.clone()), path);
            let y = eval::get_path(&Bson::Document(b.clone()), path);
            let ord = eval::sort_cmp(x.as_ref(), y.as_ref());
            let ord = if *ascending { ord } else { ord.reverse() };
            if ord.is_ne() {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    rows
}

#[derive(Debug)]
enum Accumulator {
    Push(Vec<Bson>),
    Sum { int: i64, float: f64, is_float: bool },
    First(Option<Bson>),
}

impl Accumulator {
    fn new(op: &str) -> StoreResult<Self> {
        match op {
            "$push" => Ok(Self::Push(Vec::new())),
            "$sum" => Ok(Self::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            }),
            "$first" => Ok(Self::First(None)),
            other => Err(StoreError::InvalidQuery(format!(
                "unsupported accumulator {}",
                other
            ))),
        }
    }

    fn add(&mut self, value: Option<Bson>, seen_first: bool) {
        match self {
            Self::Push(items) => items.extend(value),
            Self::Sum {
                int,
                float,
                is_float,
            } => match value {
                Some(Bson::Int32(n)) => add_integer(int, float, is_float, i64::from(n)),
                Some(Bson::Int64(n)) => add_integer(int, float, is_float, n),
                Some(Bson::Double(n)) => {
                    *float += n;
                    *is_float = true;
                }
                _ => {}
            },
            Self::First(slot) => {
                if !seen_first {
                    *slot = Some(value.unwrap_or(Bson::Null));
                }
            }
        }
    }

    fn finish(self) -> Bson {
        match self {
            Self::Push(items) => Bson::Array(items),
            Self::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    Bson::Double(float + int as f64)
                } else if let Ok(small) = i32::try_from(int) {
                    Bson::Int32(small)
                } else {
                    Bson::Int64(int)
                }
            }
            Self::First(slot) => slot.unwrap_or(Bson::Null),
        }
    }
}

/// Integer `$sum` step; on overflow the running total moves to the double.
fn add_integer(int: &mut i64, float: &mut f64, is_float: &mut bool, n: i64) {
    match int.checked_add(n) {
        Some(total) => *int = total,
        None => {
            *float += *int as f64 + n as f64;
            *int = 0;
            *is_float = true;
        }
    }
}

fn group(rows: Vec<Document>, spec: &Document) -> StoreResult<Vec<Document>> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| StoreError::InvalidQuery("$group requires _id".into()))?;

    let mut fields: Vec<(&String, &str, &Bson)> = Vec::new();
    for (name, acc) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
        let Some((op, expr)) = acc.as_document().and_then(|d| d.iter().next()) else {
            return Err(StoreError::InvalidQuery(format!(
                "$group field {} must be an accumulator",
                name
            )));
        };
        fields.push((name, op.as_str(), expr));
    }

    let vars = Vars::new();
    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for row in &rows {
        let key = eval::eval_expr(key_expr, row, &vars)?.unwrap_or(Bson::Null);
        let index = match groups.iter().position(|(k, _)| eval::values_equal(k, &key)) {
            Some(i) => i,
            None => {
                let accumulators = fields
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<StoreResult<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };
        let seen_first = groups[index].1.iter().any(|a| matches!(a, Accumulator::First(Some(_))));
        for (slot, (_, _, expr)) in fields.iter().enumerate() {
            let value = eval::eval_expr(expr, row, &vars)?;
            groups[index].1[slot].add(value, seen_first);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _, _), acc) in fields.iter().zip(accumulators) {
                out.insert((*name).clone(), acc.finish());
            }
            out
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{build_all_parts_count_query, build_parts_query};
    use mongodb::bson::doc;

    #[test]
    fn test_integer_sum_overflow_becomes_double() {
        let mut sum = Accumulator::new("$sum").unwrap();
        sum.add(Some(Bson::Int64(i64::MAX)), false);
        sum.add(Some(Bson::Int32(1)), false);
        sum.add(Some(Bson::Int32(2)), false);
        let Bson::Double(total) = sum.finish() else {
            panic!("expected a double total");
        };
        assert_eq!(total, i64::MAX as f64 + 3.0);
    }

    #[test]
    fn test_integer_sum_stays_integer() {
        let mut sum = Accumulator::new("$sum").unwrap();
        sum.add(Some(Bson::Int32(2)), false);
        sum.add(Some(Bson::Int64(3)), false);
        assert_eq!(sum.finish(), Bson::Int32(5));
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_one(
                "parts",
                doc! {
                    "_id": "P1",
                    "parts": [
                        { "_id": "C1", "type": "chapter", "position": 1 },
                        { "_id": "C2", "type": "chapter", "position": 2 },
                        { "_id": "W1", "type": "creativeWork", "position": 3 },
                    ],
                },
            )
            .await;
        store
            .insert_one("creativeworks", doc! { "_id": "W1", "format": "document" })
            .await;
        store
    }

    #[tokio::test]
    async fn test_unwind_preserves_order_and_group_rebuilds() {
        let store = seeded().await;
        let rows = store
            .aggregate("parts", build_parts_query("P1", Some(1), Some(1), None, None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let parts = rows[0].get_array("parts").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].as_document().unwrap().get_str("_id").unwrap(), "C2");
    }

    #[tokio::test]
    async fn test_lookup_enriches_format() {
        let store = seeded().await;
        let rows = store
            .aggregate(
                "parts",
                build_parts_query("P1", None, None, Some("creativeWork"), None),
            )
            .await
            .unwrap();
        let parts = rows[0].get_array("parts").unwrap();
        assert_eq!(parts.len(), 1);
        let part = parts[0].as_document().unwrap();
        assert_eq!(part.get_str("format").unwrap(), "document");
    }

    #[tokio::test]
    async fn test_group_sums_counts() {
        let store = seeded().await;
        let rows = store
            .aggregate("parts", build_all_parts_count_query("P1"))
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                doc! { "_id": "chapter", "count": 2 },
                doc! { "_id": "creativeWork", "count": 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_parent_yields_no_rows() {
        let store = seeded().await;
        let rows = store
            .aggregate("parts", build_parts_query("nope", None, None, None, None))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_negative_skip_is_rejected() {
        let store = seeded().await;
        let err = store
            .aggregate("parts", build_parts_query("P1", Some(-2), None, None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_find_sort_skip_limit_project() {
        let store = MemoryStore::new();
        store
            .insert_many(
                "books",
                (1..=5).map(|i| doc! { "_id": format!("B{}", i), "type": "book", "rank": i }),
            )
            .await;
        let rows = store
            .find(
                "books",
                FindQuery {
                    filter: doc! { "type": "book" },
                    projection: Some(doc! { "rank": 1 }),
                    sort: Some(doc! { "_id": -1 }),
                    skip: Some(1),
                    limit: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![doc! { "_id": "B4", "rank": 4 }, doc! { "_id": "B3", "rank": 3 }]
        );
        assert_eq!(store.count("books", doc! { "rank": { "$gt": 3 } }).await.unwrap(), 2);
        assert_eq!(store.len("books").await, 5);
    }

    #[tokio::test]
    async fn test_find_one_absent() {
        let store = MemoryStore::new();
        let found = store
            .find_one("books", doc! { "_id": "B1" }, None)
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
