//! Update operators, replacements and projections for in-memory documents.

use bson::{Bson, Document, oid::ObjectId};

use mongo_models_core::error::{ModelError, ModelResult};

use crate::evaluator::is_operator_document;

/// Applies an operator update (`$set`, `$unset`, `$inc`, `$push`) to `document`.
///
/// # Errors
///
/// Fails when `update` is empty, contains plain fields or unknown operators, or when an
/// operator does not fit the stored value.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> ModelResult<()> {
    if update.is_empty() || !update.keys().all(|key| key.starts_with('$')) {
        return Err(ModelError::backend("update document requires atomic operators"));
    }

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(ModelError::backend(format!("{operator} needs an object argument")));
        };

        for (path, value) in fields {
            if path == "_id" && operator != "$inc" && document.get("_id") != Some(value) {
                return Err(ModelError::backend("the _id field cannot be changed"));
            }

            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let current = get_path(document, path).cloned();
                    let next = match current {
                        None => numeric(value)?.clone(),
                        Some(current) => add(&current, numeric(value)?)?,
                    };
                    set_path(document, path, next)?;
                }
                "$push" => {
                    let mut items = match get_path(document, path).cloned() {
                        None => Vec::new(),
                        Some(Bson::Array(items)) => items,
                        Some(_) => {
                            return Err(ModelError::backend(format!(
                                "the field '{path}' must be an array"
                            )));
                        }
                    };
                    items.push(value.clone());
                    set_path(document, path, Bson::Array(items))?;
                }
                unknown => {
                    return Err(ModelError::backend(format!("unknown update operator: {unknown}")));
                }
            }
        }
    }

    Ok(())
}

/// Replaces `document` with `replacement`, keeping its `_id`.
pub(crate) fn apply_replacement(document: &mut Document, replacement: &Document) -> ModelResult<()> {
    if replacement.keys().any(|key| key.starts_with('$')) {
        return Err(ModelError::backend("replacement document must not contain atomic operators"));
    }

    let id = document.get("_id").cloned();

    if let (Some(id), Some(new_id)) = (&id, replacement.get("_id")) {
        if id != new_id {
            return Err(ModelError::backend("the _id field cannot be changed"));
        }
    }

    let mut next = Document::new();
    if let Some(id) = id {
        next.insert("_id", id);
    }
    for (key, value) in replacement {
        if key != "_id" {
            next.insert(key.clone(), value.clone());
        }
    }

    *document = next;

    Ok(())
}

/// Builds the document inserted by an upsert: the filter's equality fields plus an `_id`.
pub(crate) fn upsert_seed(filter: &Document) -> ModelResult<Document> {
    let mut seed = Document::new();

    for (key, value) in filter {
        if key.starts_with('$') {
            continue;
        }

        match value {
            Bson::Document(operators) if is_operator_document(operators) => {
                if let Some(value) = operators.get("$eq") {
                    set_path(&mut seed, key, value.clone())?;
                }
            }
            value => set_path(&mut seed, key, value.clone())?,
        }
    }

    Ok(seed)
}

/// Gives `document` a fresh `ObjectId` if it has no `_id`; the `_id` is moved first.
pub(crate) fn ensure_id(document: Document) -> (Bson, Document) {
    let id = document
        .get("_id")
        .cloned()
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut stored = Document::new();
    stored.insert("_id", id.clone());
    for (key, value) in document {
        if key != "_id" {
            stored.insert(key, value);
        }
    }

    (id, stored)
}

/// Applies a projection of inclusion or exclusion flags.
///
/// `_id` is included unless excluded explicitly.
pub(crate) fn project(document: &Document, projection: &Document) -> ModelResult<Document> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (key, flag) in projection {
        let on = match flag {
            Bson::Boolean(flag) => *flag,
            Bson::Int32(n) => *n != 0,
            Bson::Int64(n) => *n != 0,
            Bson::Double(n) => *n != 0.0,
            _ => return Err(ModelError::backend(format!("unsupported projection for {key}"))),
        };

        if key == "_id" {
            include_id = on;
        } else if on {
            included.push(key.as_str());
        } else {
            excluded.push(key.as_str());
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(ModelError::backend(
            "cannot mix inclusion and exclusion in a projection",
        ));
    }

    let mut projected = if included.is_empty() {
        let mut projected = document.clone();
        for path in excluded {
            unset_path(&mut projected, path);
        }
        projected
    } else {
        let mut projected = Document::new();
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
        for path in included {
            if let Some(value) = get_path(document, path) {
                set_path(&mut projected, path, value.clone())?;
            }
        }
        projected
    };

    if !include_id {
        projected.remove("_id");
    }

    Ok(projected)
}

pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get(part)?,
            _ => return None,
        };
    }

    Some(current)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> ModelResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match child {
                Bson::Document(child) => set_path(child, rest, value),
                _ => Err(ModelError::backend(format!(
                    "cannot create field '{rest}' in non-object '{head}'"
                ))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

fn numeric(value: &Bson) -> ModelResult<&Bson> {
    match value {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(value),
        _ => Err(ModelError::backend("cannot increment with a non-numeric argument")),
    }
}

/// Adds two numbers, widening the way the server does.
pub(crate) fn add(left: &Bson, right: &Bson) -> ModelResult<Bson> {
    Ok(match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        },
        (Bson::Int32(a), Bson::Int64(b)) | (Bson::Int64(b), Bson::Int32(a)) => {
            Bson::Int64(i64::from(*a).saturating_add(*b))
        }
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.saturating_add(*b)),
        (Bson::Double(a), other) | (other, Bson::Double(a)) => match other {
            Bson::Int32(b) => Bson::Double(a + f64::from(*b)),
            Bson::Int64(b) => Bson::Double(a + *b as f64),
            Bson::Double(b) => Bson::Double(a + b),
            _ => return Err(ModelError::backend("cannot apply arithmetic to a non-numeric field")),
        },
        _ => return Err(ModelError::backend("cannot apply arithmetic to a non-numeric field")),
    })
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn set_unset_inc_push() {
        let mut document = doc! { "name": "Ren", "count": 1, "role": { "admin": true } };

        apply_update(&mut document, &doc! {
            "$set": { "name": "Stimpy", "role.owner": true },
            "$unset": { "role.admin": "" },
            "$inc": { "count": 2, "visits": 1 },
            "$push": { "tags": "cat" },
        })
        .unwrap();

        assert_eq!(document, doc! {
            "name": "Stimpy",
            "count": 3,
            "role": { "owner": true },
            "visits": 1,
            "tags": ["cat"],
        });
    }

    #[test]
    fn plain_updates_are_rejected() {
        let mut document = doc! { "name": "Ren" };

        assert!(apply_update(&mut document, &doc! { "name": "Stimpy" }).is_err());
        assert!(apply_update(&mut document, &doc! {}).is_err());
        assert!(apply_update(&mut document, &doc! { "$rename": { "name": "title" } }).is_err());
    }

    #[test]
    fn replacement_keeps_id() {
        let id = ObjectId::new();
        let mut document = doc! { "_id": id, "name": "Ren", "hat": "fez" };

        apply_replacement(&mut document, &doc! { "name": "Stimpy" }).unwrap();

        assert_eq!(document, doc! { "_id": id, "name": "Stimpy" });
    }

    #[test]
    fn upsert_seed_takes_equalities() {
        let seed = upsert_seed(&doc! {
            "name": "Ren",
            "group": { "$eq": "Friend" },
            "count": { "$gt": 3 },
            "$or": [{ "a": 1 }],
        })
        .unwrap();

        assert_eq!(seed, doc! { "name": "Ren", "group": "Friend" });
    }

    #[test]
    fn projections() {
        let document = doc! { "_id": 1, "name": "Ren", "secret": "x", "role": { "a": 1, "b": 2 } };

        assert_eq!(
            project(&document, &doc! { "name": true }).unwrap(),
            doc! { "_id": 1, "name": "Ren" }
        );
        assert_eq!(
            project(&document, &doc! { "secret": false, "_id": 0 }).unwrap(),
            doc! { "name": "Ren", "role": { "a": 1, "b": 2 } }
        );
        assert_eq!(
            project(&document, &doc! { "role.b": 1, "_id": 0 }).unwrap(),
            doc! { "role": { "b": 2 } }
        );
        assert!(project(&document, &doc! { "name": 1, "secret": 0 }).is_err());
    }

    #[test]
    fn ensure_id_moves_id_first() {
        let (id, stored) = ensure_id(doc! { "name": "Ren" });

        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
    }
}
