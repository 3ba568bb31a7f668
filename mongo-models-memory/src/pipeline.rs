//! Aggregation pipeline execution over in-memory documents.
//!
//! Supported stages: `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$unwind`, `$count`
//! and `$group` with the `$sum`, `$avg`, `$min`, `$max`, `$first`, `$last` and `$push`
//! accumulators. Any other stage or accumulator fails like the server does.

use std::cmp::Ordering;
use bson::{Bson, Document};

use mongo_models_core::error::{ModelError, ModelResult};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, value_at},
    update::{add, project},
};

/// Runs `pipeline` over `documents`.
pub(crate) fn run(documents: Vec<Document>, pipeline: &[Document]) -> ModelResult<Vec<Document>> {
    let mut current = documents;

    for stage in pipeline {
        if stage.len() != 1 {
            return Err(ModelError::backend(
                "a pipeline stage specification object must contain exactly one field",
            ));
        }

        let Some((name, spec)) = stage.iter().next() else {
            continue;
        };

        current = match name.as_str() {
            "$match" => DocumentEvaluator::filter_documents(&current, as_document(name, spec)?)?,
            "$sort" => {
                sort_documents(&mut current, as_document(name, spec)?);
                current
            }
            "$skip" => current.into_iter().skip(as_count(name, spec)?).collect(),
            "$limit" => current.into_iter().take(as_count(name, spec)?).collect(),
            "$project" => {
                let projection = as_document(name, spec)?;
                current
                    .iter()
                    .map(|document| project(document, projection))
                    .collect::<ModelResult<Vec<_>>>()?
            }
            "$unwind" => unwind(current, spec)?,
            "$count" => {
                let Bson::String(field) = spec else {
                    return Err(ModelError::backend("$count needs a field name"));
                };
                if current.is_empty() {
                    Vec::new()
                } else {
                    let mut output = Document::new();
                    output.insert(field.clone(), count_value(current.len()));
                    vec![output]
                }
            }
            "$group" => group(&current, as_document(name, spec)?)?,
            unknown => {
                return Err(ModelError::backend(format!(
                    "unrecognized pipeline stage name: '{unknown}'"
                )));
            }
        };
    }

    Ok(current)
}

/// Sorts by a `{ field: 1 | -1 }` specification, stable for equal keys.
pub(crate) fn sort_documents(documents: &mut [Document], spec: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in spec {
            let left = value_at(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
            let right = value_at(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

            let ordering = left.sort_cmp(&right);
            let ordering = if is_descending(direction) { ordering.reverse() } else { ordering };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

fn is_descending(direction: &Bson) -> bool {
    match direction {
        Bson::Int32(n) => *n < 0,
        Bson::Int64(n) => *n < 0,
        Bson::Double(n) => *n < 0.0,
        _ => false,
    }
}

fn as_document<'a>(stage: &str, spec: &'a Bson) -> ModelResult<&'a Document> {
    match spec {
        Bson::Document(document) => Ok(document),
        _ => Err(ModelError::backend(format!("{stage} specification must be an object"))),
    }
}

fn as_count(stage: &str, spec: &Bson) -> ModelResult<usize> {
    match spec {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        _ => Err(ModelError::backend(format!("{stage} needs a non-negative integer"))),
    }
}

fn count_value(count: usize) -> Bson {
    match i32::try_from(count) {
        Ok(count) => Bson::Int32(count),
        Err(_) => Bson::Int64(count as i64),
    }
}

fn unwind(documents: Vec<Document>, spec: &Bson) -> ModelResult<Vec<Document>> {
    let path = match spec {
        Bson::String(path) => path.as_str(),
        Bson::Document(options) => match options.get("path") {
            Some(Bson::String(path)) => path.as_str(),
            _ => return Err(ModelError::backend("$unwind needs a path")),
        },
        _ => return Err(ModelError::backend("$unwind needs a path")),
    };
    let Some(field) = path.strip_prefix('$') else {
        return Err(ModelError::backend("$unwind path must start with '$'"));
    };

    let mut output = Vec::new();

    for document in documents {
        match document.get(field) {
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut unwound = document.clone();
                    unwound.insert(field, item.clone());
                    output.push(unwound);
                }
            }
            Some(Bson::Null) | None => {}
            Some(_) => output.push(document),
        }
    }

    Ok(output)
}

/// Evaluates a `$group` expression: `"$field"` references, nested documents or literals.
fn evaluate(document: &Document, expression: &Bson) -> Bson {
    match expression {
        Bson::String(reference) if reference.starts_with('$') => value_at(document, &reference[1..])
            .cloned()
            .unwrap_or(Bson::Null),
        Bson::Document(fields) => Bson::Document(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), evaluate(document, value)))
                .collect(),
        ),
        literal => literal.clone(),
    }
}

enum Accumulator {
    Sum(Bson),
    Avg { total: f64, count: u32 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Bson),
    Push(Vec<Bson>),
}

impl Accumulator {
    fn new(operator: &str) -> ModelResult<Self> {
        Ok(match operator {
            "$sum" => Accumulator::Sum(Bson::Int32(0)),
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(Bson::Null),
            "$push" => Accumulator::Push(Vec::new()),
            unknown => {
                return Err(ModelError::backend(format!(
                    "unknown group operator '{unknown}'"
                )));
            }
        })
    }

    fn accumulate(&mut self, value: Bson) -> ModelResult<()> {
        match self {
            Accumulator::Sum(sum) => {
                // Non-numeric values are ignored by $sum
                if matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                    *sum = add(sum, &value)?;
                }
            }
            Accumulator::Avg { total, count } => {
                let number = match value {
                    Bson::Int32(n) => Some(f64::from(n)),
                    Bson::Int64(n) => Some(n as f64),
                    Bson::Double(n) => Some(n),
                    _ => None,
                };
                if let Some(number) = number {
                    *total += number;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => keep_extreme(current, value, Ordering::Less),
            Accumulator::Max(current) => keep_extreme(current, value, Ordering::Greater),
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Accumulator::Last(current) => *current = value,
            Accumulator::Push(values) => values.push(value),
        }

        Ok(())
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum(sum) => sum,
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / f64::from(count))
                }
            }
            Accumulator::Min(value) | Accumulator::Max(value) | Accumulator::First(value) => {
                value.unwrap_or(Bson::Null)
            }
            Accumulator::Last(value) => value,
            Accumulator::Push(values) => Bson::Array(values),
        }
    }
}

fn keep_extreme(current: &mut Option<Bson>, value: Bson, wanted: Ordering) {
    if matches!(value, Bson::Null | Bson::Undefined) {
        return;
    }

    let replace = match current {
        None => true,
        Some(existing) => Comparable::from(&value).sort_cmp(&Comparable::from(&*existing)) == wanted,
    };

    if replace {
        *current = Some(value);
    }
}

fn group(documents: &[Document], spec: &Document) -> ModelResult<Vec<Document>> {
    let Some(key_expression) = spec.get("_id") else {
        return Err(ModelError::backend("a group specification must include an _id"));
    };

    let mut fields = Vec::new();
    for (name, accumulator) in spec {
        if name == "_id" {
            continue;
        }
        match accumulator {
            Bson::Document(operator) if operator.len() == 1 => {
                if let Some((operator, expression)) = operator.iter().next() {
                    Accumulator::new(operator)?;
                    fields.push((name.clone(), operator.clone(), expression.clone()));
                }
            }
            _ => {
                return Err(ModelError::backend(format!(
                    "the field '{name}' must be an accumulator object"
                )));
            }
        }
    }

    // Groups keep first-seen order
    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();

    for document in documents {
        let key = evaluate(document, key_expression);
        let position = match groups
            .iter()
            .position(|(existing, _)| Comparable::from(existing) == Comparable::from(&key))
        {
            Some(position) => position,
            None => {
                let accumulators = fields
                    .iter()
                    .map(|(_, operator, _)| Accumulator::new(operator))
                    .collect::<ModelResult<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };

        for ((_, _, expression), accumulator) in fields.iter().zip(groups[position].1.iter_mut()) {
            accumulator.accumulate(evaluate(document, expression))?;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut output = Document::new();
            output.insert("_id", key);
            for ((name, _, _), accumulator) in fields.iter().zip(accumulators) {
                output.insert(name.clone(), accumulator.finish());
            }
            output
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn cartoons() -> Vec<Document> {
        vec![
            doc! { "name": "Ren", "group": "Friend", "count": 100 },
            doc! { "name": "Stimpy", "group": "Friend", "count": 10 },
            doc! { "name": "Yak", "group": "Foe", "count": 430 },
        ]
    }

    #[test]
    fn group_and_sort_totals() {
        let results = run(cartoons(), &[
            doc! { "$match": {} },
            doc! { "$group": { "_id": "$group", "total": { "$sum": "$count" } } },
            doc! { "$sort": { "total": -1 } },
        ])
        .unwrap();

        assert_eq!(results, vec![
            doc! { "_id": "Foe", "total": 430 },
            doc! { "_id": "Friend", "total": 110 },
        ]);
    }

    #[test]
    fn accumulators() {
        let results = run(cartoons(), &[doc! { "$group": {
            "_id": null,
            "count": { "$sum": 1 },
            "avg": { "$avg": "$count" },
            "min": { "$min": "$count" },
            "max": { "$max": "$count" },
            "first": { "$first": "$name" },
            "last": { "$last": "$name" },
            "names": { "$push": "$name" },
        } }])
        .unwrap();

        assert_eq!(results, vec![doc! {
            "_id": null,
            "count": 3,
            "avg": 180.0,
            "min": 10,
            "max": 430,
            "first": "Ren",
            "last": "Yak",
            "names": ["Ren", "Stimpy", "Yak"],
        }]);
    }

    #[test]
    fn window_project_and_count() {
        let results = run(cartoons(), &[
            doc! { "$sort": { "count": 1 } },
            doc! { "$skip": 1 },
            doc! { "$limit": 1 },
            doc! { "$project": { "name": 1, "_id": 0 } },
        ])
        .unwrap();

        assert_eq!(results, vec![doc! { "name": "Ren" }]);

        let counted = run(cartoons(), &[
            doc! { "$match": { "group": "Friend" } },
            doc! { "$count": "friends" },
        ])
        .unwrap();

        assert_eq!(counted, vec![doc! { "friends": 2 }]);
    }

    #[test]
    fn unwind_arrays() {
        let results = run(vec![doc! { "name": "Ren", "tags": ["a", "b"] }], &[
            doc! { "$unwind": "$tags" },
        ])
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].get_str("tags").unwrap(), "b");
    }

    #[test]
    fn unknown_operators_fail() {
        let bad_accumulator = run(cartoons(), &[
            doc! { "$group": { "_id": "$group", "total": { "$$$sum": "$count" } } },
        ]);
        let bad_stage = run(cartoons(), &[doc! { "$frobnicate": {} }]);

        assert!(matches!(bad_accumulator, Err(ModelError::Backend(_))));
        assert!(matches!(bad_stage, Err(ModelError::Backend(_))));
    }
}
