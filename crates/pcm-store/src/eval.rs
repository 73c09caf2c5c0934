//! Evaluation of query filters, expressions and projections over BSON
//! documents.
//!
//! This covers the subset of MongoDB semantics the query builders in
//! [`crate::pipeline`] emit, plus the common comparison operators callers use
//! in rule filters. It backs [`crate::memory::MemoryStore`].

use std::cmp::Ordering;
use std::collections::HashMap;

use mongodb::bson::{Bson, Document};
use regex::RegexBuilder;

use crate::error::{StoreError, StoreResult};

/// Variables bound by `$filter` (and friends) during expression evaluation.
pub type Vars = HashMap<String, Bson>;

// ============================================================================
// Paths
// ============================================================================

/// Every value reachable at a dotted path, descending through arrays.
///
/// An array found at the end of the path is returned as-is; callers that
/// need MongoDB's "any element" semantics expand it themselves.
pub fn resolve_path(doc: &Document, path: &str) -> Vec<Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    resolve_segments(&Bson::Document(doc.clone()), &segments, &mut out);
    out
}

fn resolve_segments(value: &Bson, segments: &[&str], out: &mut Vec<Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value.clone());
        return;
    };
    match value {
        Bson::Document(d) => {
            if let Some(v) = d.get(*head) {
                resolve_segments(v, rest, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(v) = items.get(index) {
                    resolve_segments(v, rest, out);
                }
                return;
            }
            for item in items {
                if let Bson::Document(_) = item {
                    resolve_segments(item, segments, out);
                }
            }
        }
        _ => {}
    }
}

/// Expression-style field lookup: arrays along the path yield arrays of
/// the values found in their elements. `None` means the field is missing.
pub fn get_path(value: &Bson, path: &str) -> Option<Bson> {
    if path.is_empty() {
        return Some(value.clone());
    }
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, r),
        None => (path, ""),
    };
    match value {
        Bson::Document(d) => d.get(head).and_then(|v| get_path(v, rest)),
        Bson::Array(items) => {
            let found: Vec<Bson> = items.iter().filter_map(|item| get_path(item, path)).collect();
            Some(Bson::Array(found))
        }
        _ => None,
    }
}

/// Set a dotted path, creating intermediate documents as needed.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            let needs_doc = !matches!(doc.get(head), Some(Bson::Document(_)));
            if needs_doc {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

/// Remove a dotted path if present.
pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(child)) => remove_path(child, rest),
            Some(Bson::Array(items)) => {
                for item in items.iter_mut() {
                    if let Bson::Document(child) = item {
                        remove_path(child, rest);
                    }
                }
            }
            _ => {}
        },
    }
}

// ============================================================================
// Comparison
// ============================================================================

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Equality with numeric types compared by value.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (Bson::Array(xs), Bson::Array(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
            }
            _ => a == b,
        },
    }
}

/// Ordering for values of comparable types; `None` across types.
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Sort ordering: missing and null first, then by value; mismatched types
/// compare equal so a stable sort keeps their input order.
pub fn sort_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None | Some(Bson::Null), None | Some(Bson::Null)) => Ordering::Equal,
        (None | Some(Bson::Null), _) => Ordering::Less,
        (_, None | Some(Bson::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

/// MongoDB truthiness: false, null, zero and missing are false.
pub fn is_truthy(value: Option<&Bson>) -> bool {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => false,
        Some(Bson::Boolean(b)) => *b,
        Some(v) => as_f64(v).is_none_or(|n| n != 0.0),
    }
}

// ============================================================================
// Query Filters
// ============================================================================

/// Whether `doc` satisfies the query `filter`.
pub fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => logical_all(doc, condition)?,
            "$or" => logical_any(doc, condition)?,
            "$nor" => !logical_any(doc, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported top-level operator {}",
                    op
                )));
            }
            path => field_matches(&resolve_path(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters(condition: &Bson) -> StoreResult<Vec<&Document>> {
    let Bson::Array(items) = condition else {
        return Err(StoreError::InvalidQuery(
            "logical operators take an array of filters".into(),
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => Ok(d),
            _ => Err(StoreError::InvalidQuery(
                "logical operator entries must be documents".into(),
            )),
        })
        .collect()
}

fn logical_all(doc: &Document, condition: &Bson) -> StoreResult<bool> {
    for filter in sub_filters(condition)? {
        if !matches(doc, filter)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical_any(doc: &Document, condition: &Bson) -> StoreResult<bool> {
    for filter in sub_filters(condition)? {
        if matches(doc, filter)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_doc(d: &Document) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Candidates plus, for array candidates, their elements.
fn expand(candidates: &[Bson]) -> Vec<&Bson> {
    let mut out = Vec::new();
    for c in candidates {
        out.push(c);
        if let Bson::Array(items) = c {
            out.extend(items.iter());
        }
    }
    out
}

fn field_matches(candidates: &[Bson], condition: &Bson) -> StoreResult<bool> {
    match condition {
        Bson::Document(ops) if is_operator_doc(ops) => {
            for (op, operand) in ops {
                if !operator_matches(candidates, op, operand, ops)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Bson::RegularExpression(re) => regex_matches(candidates, &re.pattern, &re.options),
        value => Ok(equals_any(candidates, value)),
    }
}

fn equals_any(candidates: &[Bson], value: &Bson) -> bool {
    if matches!(value, Bson::Null) && candidates.is_empty() {
        return true;
    }
    expand(candidates).into_iter().any(|c| values_equal(c, value))
}

fn operator_matches(
    candidates: &[Bson],
    op: &str,
    operand: &Bson,
    siblings: &Document,
) -> StoreResult<bool> {
    let ordered = |want: fn(Ordering) -> bool| {
        expand(candidates)
            .into_iter()
            .any(|c| compare_values(c, operand).is_some_and(want))
    };
    match op {
        "$eq" => Ok(equals_any(candidates, operand)),
        "$ne" => Ok(!equals_any(candidates, operand)),
        "$gt" => Ok(ordered(|o| o == Ordering::Greater)),
        "$gte" => Ok(ordered(|o| o != Ordering::Less)),
        "$lt" => Ok(ordered(|o| o == Ordering::Less)),
        "$lte" => Ok(ordered(|o| o != Ordering::Greater)),
        "$in" => {
            let values = operand_array(op, operand)?;
            Ok(values.iter().any(|v| equals_any(candidates, v)))
        }
        "$nin" => {
            let values = operand_array(op, operand)?;
            Ok(!values.iter().any(|v| equals_any(candidates, v)))
        }
        "$exists" => Ok(is_truthy(Some(operand)) != candidates.is_empty()),
        "$regex" => {
            let pattern = match operand {
                Bson::String(p) => p.as_str(),
                Bson::RegularExpression(re) => re.pattern.as_str(),
                _ => return Err(StoreError::InvalidQuery("$regex takes a string".into())),
            };
            let options = siblings.get_str("$options").unwrap_or_default();
            regex_matches(candidates, pattern, options)
        }
        "$options" => Ok(true),
        "$elemMatch" => {
            let Bson::Document(sub) = operand else {
                return Err(StoreError::InvalidQuery("$elemMatch takes a document".into()));
            };
            for candidate in candidates {
                if let Bson::Array(items) = candidate {
                    for item in items {
                        if element_matches(item, sub)? {
                            return Ok(true);
                        }
                    }
                }
            }
            Ok(false)
        }
        "$size" => {
            let want = as_f64(operand).ok_or_else(|| {
                StoreError::InvalidQuery("$size takes a number".into())
            })?;
            Ok(candidates
                .iter()
                .any(|c| matches!(c, Bson::Array(items) if items.len() as f64 == want)))
        }
        other => Err(StoreError::InvalidQuery(format!(
            "unsupported query operator {}",
            other
        ))),
    }
}

fn operand_array<'a>(op: &str, operand: &'a Bson) -> StoreResult<&'a Vec<Bson>> {
    match operand {
        Bson::Array(values) => Ok(values),
        _ => Err(StoreError::InvalidQuery(format!("{} takes an array", op))),
    }
}

fn regex_matches(candidates: &[Bson], pattern: &str, options: &str) -> StoreResult<bool> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| StoreError::InvalidQuery(format!("invalid $regex: {}", e)))?;
    Ok(expand(candidates)
        .into_iter()
        .any(|c| matches!(c, Bson::String(s) if re.is_match(s))))
}

/// `$elemMatch` against one array element.
pub fn element_matches(element: &Bson, filter: &Document) -> StoreResult<bool> {
    let is_logical = |k: &str| matches!(k, "$and" | "$or" | "$nor");
    if is_operator_doc(filter) && !filter.keys().any(|k| is_logical(k.as_str())) {
        return field_matches(std::slice::from_ref(element), &Bson::Document(filter.clone()));
    }
    match element {
        Bson::Document(d) => matches(d, filter),
        _ => Ok(false),
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Evaluate an aggregation expression against a row.
///
/// Returns `None` when the expression refers to a missing field.
pub fn eval_expr(expr: &Bson, root: &Document, vars: &Vars) -> StoreResult<Option<Bson>> {
    match expr {
        Bson::String(s) if s.starts_with("$$") => {
            let reference = &s[2..];
            let (name, rest) = reference.split_once('.').unwrap_or((reference, ""));
            let value = match name {
                "ROOT" | "CURRENT" => Some(Bson::Document(root.clone())),
                _ => vars.get(name).cloned(),
            };
            Ok(value.and_then(|v| get_path(&v, rest)))
        }
        Bson::String(s) if s.starts_with('$') => {
            Ok(get_path(&Bson::Document(root.clone()), &s[1..]))
        }
        Bson::Document(d) if is_operator_doc(d) => eval_operator(d, root, vars),
        Bson::Document(d) => {
            let mut out = Document::new();
            for (k, v) in d {
                if let Some(value) = eval_expr(v, root, vars)? {
                    out.insert(k.clone(), value);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        Bson::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_expr(item, root, vars)?.unwrap_or(Bson::Null));
            }
            Ok(Some(Bson::Array(out)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn eval_args(args: &Bson, root: &Document, vars: &Vars) -> StoreResult<Vec<Option<Bson>>> {
    match args {
        Bson::Array(items) => items.iter().map(|i| eval_expr(i, root, vars)).collect(),
        single => Ok(vec![eval_expr(single, root, vars)?]),
    }
}

fn eval_operator(d: &Document, root: &Document, vars: &Vars) -> StoreResult<Option<Bson>> {
    let Some((op, args)) = d.iter().next() else {
        return Ok(None);
    };
    match op.as_str() {
        "$filter" => eval_filter(args, root, vars),
        "$in" => {
            let values = eval_args(args, root, vars)?;
            let [needle, Some(Bson::Array(haystack))] = values.as_slice() else {
                return Err(StoreError::InvalidQuery(
                    "$in expression takes [value, array]".into(),
                ));
            };
            let needle = needle.clone().unwrap_or(Bson::Null);
            Ok(Some(Bson::Boolean(
                haystack.iter().any(|v| values_equal(v, &needle)),
            )))
        }
        "$eq" | "$ne" => {
            let values = eval_args(args, root, vars)?;
            let [a, b] = values.as_slice() else {
                return Err(StoreError::InvalidQuery(format!("{} takes two arguments", op)));
            };
            let equal = values_equal(
                a.as_ref().unwrap_or(&Bson::Null),
                b.as_ref().unwrap_or(&Bson::Null),
            );
            Ok(Some(Bson::Boolean(equal == (op == "$eq"))))
        }
        "$and" => {
            let values = eval_args(args, root, vars)?;
            Ok(Some(Bson::Boolean(values.iter().all(|v| is_truthy(v.as_ref())))))
        }
        "$or" => {
            let values = eval_args(args, root, vars)?;
            Ok(Some(Bson::Boolean(values.iter().any(|v| is_truthy(v.as_ref())))))
        }
        "$literal" => Ok(Some(args.clone())),
        other => Err(StoreError::InvalidQuery(format!(
            "unsupported expression operator {}",
            other
        ))),
    }
}

fn eval_filter(args: &Bson, root: &Document, vars: &Vars) -> StoreResult<Option<Bson>> {
    let Bson::Document(spec) = args else {
        return Err(StoreError::InvalidQuery("$filter takes a document".into()));
    };
    let input = spec
        .get("input")
        .ok_or_else(|| StoreError::InvalidQuery("$filter requires input".into()))?;
    let cond = spec
        .get("cond")
        .ok_or_else(|| StoreError::InvalidQuery("$filter requires cond".into()))?;
    let name = spec.get_str("as").unwrap_or("this");

    let items = match eval_expr(input, root, vars)? {
        Some(Bson::Array(items)) => items,
        None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
        Some(_) => {
            return Err(StoreError::InvalidQuery("$filter input must be an array".into()));
        }
    };

    let mut scoped = vars.clone();
    let mut kept = Vec::new();
    for item in items {
        scoped.insert(name.to_string(), item.clone());
        if is_truthy(eval_expr(cond, root, &scoped)?.as_ref()) {
            kept.push(item);
        }
    }
    Ok(Some(Bson::Array(kept)))
}

// ============================================================================
// Projection
// ============================================================================

#[derive(Debug, Default)]
struct IncludeTree {
    children: Vec<(String, Option<IncludeTree>)>,
}

impl IncludeTree {
    fn insert(&mut self, path: &str) {
        let (head, rest) = match path.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (path, None),
        };
        let position = self.children.iter().position(|(k, _)| k == head);
        match (position, rest) {
            // Whole field already included.
            (Some(i), _) if self.children[i].1.is_none() => {}
            (Some(i), None) => self.children[i].1 = None,
            (Some(i), Some(rest)) => {
                if let Some(child) = self.children[i].1.as_mut() {
                    child.insert(rest);
                }
            }
            (None, None) => self.children.push((head.to_string(), None)),
            (None, Some(rest)) => {
                let mut child = IncludeTree::default();
                child.insert(rest);
                self.children.push((head.to_string(), Some(child)));
            }
        }
    }

    fn get(&self, key: &str) -> Option<&Option<IncludeTree>> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn apply(&self, doc: &Document) -> Document {
        let mut out = Document::new();
        for (key, value) in doc {
            match self.get(key) {
                None => {}
                Some(None) => {
                    out.insert(key.clone(), value.clone());
                }
                Some(Some(sub)) => {
                    if let Some(projected) = sub.apply_value(value) {
                        out.insert(key.clone(), projected);
                    }
                }
            }
        }
        out
    }

    fn apply_value(&self, value: &Bson) -> Option<Bson> {
        match value {
            Bson::Document(d) => Some(Bson::Document(self.apply(d))),
            Bson::Array(items) => Some(Bson::Array(
                items.iter().filter_map(|i| self.apply_value(i)).collect(),
            )),
            _ => None,
        }
    }
}

fn is_flag(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(b) => Some(*b),
        v => as_f64(v).map(|n| n != 0.0),
    }
}

/// Apply a `$project` / find projection to a document.
///
/// Supports inclusion (`1`/`true`), exclusion (`0`/`false`), computed
/// expressions and the `$elemMatch` projection operator.
pub fn project(doc: &Document, spec: &Document) -> StoreResult<Document> {
    if spec.is_empty() {
        return Ok(doc.clone());
    }

    let exclusion = spec
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .all(|(_, v)| is_flag(v) == Some(false));

    if exclusion {
        let mut out = doc.clone();
        for (path, value) in spec {
            if is_flag(value) == Some(false) {
                remove_path(&mut out, path);
            }
        }
        return Ok(out);
    }

    let mut tree = IncludeTree::default();
    let mut computed = Vec::new();
    let include_id = spec.get("_id").and_then(is_flag).unwrap_or(true);
    if include_id {
        tree.insert("_id");
    }
    for (path, value) in spec {
        match is_flag(value) {
            Some(true) => tree.insert(path),
            Some(false) => {}
            None => computed.push((path, value)),
        }
    }

    let mut out = tree.apply(doc);
    let vars = Vars::new();
    for (path, value) in computed {
        if let Some(sub) = value.as_document().and_then(|op| op.get_document("$elemMatch").ok()) {
            if let Some(item) = first_element_match(doc, path, sub)? {
                set_path(&mut out, path, Bson::Array(vec![item]));
            }
            continue;
        }
        if let Some(v) = eval_expr(value, doc, &vars)? {
            set_path(&mut out, path, v);
        }
    }
    Ok(out)
}

fn first_element_match(doc: &Document, path: &str, filter: &Document) -> StoreResult<Option<Bson>> {
    for candidate in resolve_path(doc, path) {
        if let Bson::Array(items) = candidate {
            for item in items {
                if element_matches(&item, filter)? {
                    return Ok(Some(item));
                }
            }
        }
    }
    Ok(None)
}

// ============================================================================
// Tests
// ============================================================================
