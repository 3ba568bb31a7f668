//! Filter evaluation for in-memory documents.
//!
//! This module evaluates MongoDB query documents against stored documents: implicit
//! equality, field operators, logical operators and dotted paths into nested documents
//! and arrays. Unknown operators are rejected the way the server rejects them.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use mongo_models_core::error::{ModelError, ModelResult};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so `1`, `1_i64` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Values without a natural comparison (binary, regex, code...)
    Opaque(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Opaque(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position in the server's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Opaque(_) => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    /// Total order used for sorting, ranking by type first.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Opaque(a), Comparable::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            _ => None,
        }
    }
}

/// Collects the values found at a dotted `path`.
///
/// Arrays of documents are traversed element by element, so `"tags.name"` yields the
/// `name` of every document in `tags`. Numeric segments index into arrays.
pub(crate) fn values_at<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut found = Vec::new();
    let parts = path.split('.').collect::<Vec<_>>();

    if let Some((first, rest)) = parts.split_first() {
        if let Some(value) = document.get(*first) {
            collect_values(value, rest, &mut found);
        }
    }

    found
}

fn collect_values<'a>(value: &'a Bson, parts: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((first, rest)) = parts.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(*first) {
                collect_values(next, rest, found);
            }
        }
        Bson::Array(items) => match first.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = items.get(index) {
                    collect_values(next, rest, found);
                }
            }
            Err(_) => {
                for item in items {
                    if let Bson::Document(_) = item {
                        collect_values(item, parts, found);
                    }
                }
            }
        },
        _ => {}
    }
}

/// First value at a dotted path, as used by sorting and `$group` field references.
pub(crate) fn value_at<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    values_at(document, path).into_iter().next()
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies `filter`.
    ///
    /// # Errors
    ///
    /// Fails on unknown operators or malformed operator arguments.
    pub fn matches(&self, filter: &Document) -> ModelResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in clauses(key, condition)? {
                        if !self.matches(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => {
                    let mut any = false;
                    for clause in clauses(key, condition)? {
                        if self.matches(clause)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                "$nor" => {
                    let mut none = true;
                    for clause in clauses(key, condition)? {
                        if self.matches(clause)? {
                            none = false;
                            break;
                        }
                    }
                    none
                }
                operator if operator.starts_with('$') => {
                    return Err(ModelError::backend(format!(
                        "unknown top level operator: {operator}"
                    )));
                }
                field => self.matches_field(field, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn matches_field(&self, field: &str, condition: &Bson) -> ModelResult<bool> {
        let values = values_at(self.document, field);

        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                evaluate_operators(&values, operators)
            }
            expected => Ok(equals_any(&values, expected)),
        }
    }

    /// Filters `documents`, returning the matching ones in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> ModelResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

pub(crate) fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn clauses<'b>(operator: &str, condition: &'b Bson) -> ModelResult<Vec<&'b Document>> {
    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(doc) => Ok(doc),
                _ => Err(ModelError::backend(format!(
                    "{operator} entries must be objects"
                ))),
            })
            .collect(),
        _ => Err(ModelError::backend(format!(
            "{operator} must be a nonempty array"
        ))),
    }
}

fn evaluate_operators(values: &[&Bson], operators: &Document) -> ModelResult<bool> {
    for (operator, argument) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals_any(values, argument),
            "$ne" => !equals_any(values, argument),
            "$gt" => compares_any(values, argument, |ord| ord == Ordering::Greater),
            "$gte" => compares_any(values, argument, |ord| ord != Ordering::Less),
            "$lt" => compares_any(values, argument, |ord| ord == Ordering::Less),
            "$lte" => compares_any(values, argument, |ord| ord != Ordering::Greater),
            "$in" => in_list(values, operator, argument)?,
            "$nin" => !in_list(values, operator, argument)?,
            "$exists" => !values.is_empty() == truthy(argument),
            "$not" => match argument {
                Bson::Document(inner) if is_operator_document(inner) => {
                    !evaluate_operators(values, inner)?
                }
                _ => return Err(ModelError::backend("$not needs an operator document")),
            },
            "$size" => {
                let size = match argument {
                    Bson::Int32(n) => *n as usize,
                    Bson::Int64(n) => *n as usize,
                    _ => return Err(ModelError::backend("$size needs a number")),
                };
                values
                    .iter()
                    .any(|value| matches!(value, Bson::Array(items) if items.len() == size))
            }
            unknown => {
                return Err(ModelError::backend(format!("unknown operator: {unknown}")));
            }
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Equality with array membership: `{ tags: "a" }` matches `tags: ["a", "b"]`, and
/// `{ field: null }` matches a missing field.
fn equals_any(values: &[&Bson], expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    if values.is_empty() {
        return expected == Comparable::Null;
    }

    values.iter().any(|value| {
        let value = Comparable::from(*value);
        match &value {
            Comparable::Array(items) => value == expected || items.iter().any(|item| *item == expected),
            _ => value == expected,
        }
    })
}

fn compares_any(values: &[&Bson], bound: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(bound);

    values.iter().any(|value| {
        let value = Comparable::from(*value);
        let candidates = match value {
            Comparable::Array(items) => items,
            single => vec![single],
        };

        candidates
            .iter()
            .any(|candidate| candidate.partial_cmp(&bound).is_some_and(&accept))
    })
}

fn in_list(values: &[&Bson], operator: &str, argument: &Bson) -> ModelResult<bool> {
    match argument {
        Bson::Array(options) => Ok(options.iter().any(|option| equals_any(values, option))),
        _ => Err(ModelError::backend(format!("{operator} needs an array"))),
    }
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(flag) => *flag,
        Bson::Int32(number) => *number != 0,
        Bson::Int64(number) => *number != 0,
        Bson::Double(number) => *number != 0.0,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn matches(document: Document, filter: Document) -> bool {
        DocumentEvaluator::new(&document).matches(&filter).unwrap()
    }

    #[test]
    fn implicit_equality() {
        assert!(matches(doc! { "name": "Ren" }, doc! { "name": "Ren" }));
        assert!(!matches(doc! { "name": "Ren" }, doc! { "name": "Stimpy" }));
        assert!(matches(doc! { "count": 1_i64 }, doc! { "count": 1.0 }));
    }

    #[test]
    fn null_matches_missing() {
        assert!(matches(doc! { "name": "Ren" }, doc! { "hat": null }));
        assert!(!matches(doc! { "hat": "fez" }, doc! { "hat": null }));
    }

    #[test]
    fn array_membership() {
        let document = doc! { "tags": ["cat", "dog"] };

        assert!(matches(document.clone(), doc! { "tags": "dog" }));
        assert!(matches(document.clone(), doc! { "tags": ["cat", "dog"] }));
        assert!(matches(document.clone(), doc! { "tags": { "$in": ["fish", "cat"] } }));
        assert!(!matches(document, doc! { "tags": { "$nin": ["cat"] } }));
    }

    #[test]
    fn comparisons() {
        let document = doc! { "count": 100 };

        assert!(matches(document.clone(), doc! { "count": { "$gt": 10, "$lte": 100 } }));
        assert!(!matches(document.clone(), doc! { "count": { "$lt": 100 } }));
        assert!(!matches(document, doc! { "count": { "$gt": "a" } }));
    }

    #[test]
    fn dotted_paths() {
        let document = doc! {
            "role": { "admin": { "name": "Ren" } },
            "pets": [{ "name": "Stimpy" }, { "name": "Yak" }],
        };

        assert!(matches(document.clone(), doc! { "role.admin.name": "Ren" }));
        assert!(matches(document.clone(), doc! { "pets.name": "Yak" }));
        assert!(matches(document.clone(), doc! { "pets.0.name": "Stimpy" }));
        assert!(!matches(document.clone(), doc! { "role.special": { "$exists": true } }));
        assert!(matches(document, doc! { "role.special": { "$exists": false } }));
    }

    #[test]
    fn logical_operators() {
        let document = doc! { "name": "Ren", "count": 3 };

        assert!(matches(document.clone(), doc! { "$or": [{ "name": "Yak" }, { "count": 3 }] }));
        assert!(!matches(document.clone(), doc! { "$and": [{ "name": "Ren" }, { "count": 4 }] }));
        assert!(matches(document.clone(), doc! { "$nor": [{ "name": "Yak" }] }));
        assert!(matches(document, doc! { "count": { "$not": { "$gt": 5 } } }));
    }

    #[test]
    fn unknown_operators_fail() {
        let document = doc! { "name": "Ren" };

        assert!(DocumentEvaluator::new(&document).matches(&doc! { "name": { "$near": 1 } }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$where": "1" }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$or": [] }).is_err());
    }

    #[test]
    fn sort_order_across_types() {
        let null = Bson::Null;
        let number = Bson::Int32(5);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).sort_cmp(&Comparable::from(&number)), Ordering::Greater);
    }
}
