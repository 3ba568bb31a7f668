//! Result shape normalization.
//!
//! Driver responses come in a handful of shapes: a list of documents, a single document, a
//! find-and-modify envelope (`{ value: doc | null }`) and a write envelope
//! (`{ ops: [..] }`). Adapters turn each shape into a [`DriverResponse`] variant at the
//! boundary, and [`DriverResponse::into_models`] turns that into model instances.
//!
//! Untyped values go through [`DriverResponse::classify`], which inspects the value in a
//! fixed order: array, then `value` without `_id`, then `ops`, then `_id`. Anything else is
//! passed through untouched, so plain counts and acknowledgements never become models.

use bson::{Bson, Document};

use crate::{
    error::{ModelError, ModelResult},
    model::{Model, ModelExt},
    results::{InsertManyResult, InsertOneResult, ModifyResult},
};

/// The closed set of response shapes a driver call can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverResponse {
    /// A single document.
    Found(Document),
    /// A find-and-modify call that matched nothing.
    NotFound,
    /// An ordered sequence of documents.
    Many(Vec<Document>),
    /// A write envelope; `ops` are the affected documents.
    Written { ops: Vec<Document> },
    /// Anything else (counts, acknowledgements, scalars).
    Other(Bson),
}

impl DriverResponse {
    /// Classifies an untyped driver value.
    pub fn classify(raw: Bson) -> Self {
        match raw {
            Bson::Array(items) => match documents_of(items) {
                Ok(documents) => DriverResponse::Many(documents),
                Err(items) => DriverResponse::Other(Bson::Array(items)),
            },
            Bson::Document(document) => Self::classify_document(document),
            other => DriverResponse::Other(other),
        }
    }

    fn classify_document(mut document: Document) -> Self {
        if document.contains_key("value") && !document.contains_key("_id") {
            return match document.remove("value") {
                Some(Bson::Document(value)) => DriverResponse::Found(value),
                Some(value) if is_truthy(&value) => DriverResponse::Other(value),
                _ => DriverResponse::NotFound,
            };
        }

        if document.contains_key("ops") {
            let written = matches!(
                document.get("ops"),
                Some(Bson::Array(ops)) if ops.iter().all(|op| matches!(op, Bson::Document(_)))
            );

            if written {
                if let Some(Bson::Array(ops)) = document.remove("ops") {
                    return DriverResponse::Written {
                        ops: documents_of(ops).unwrap_or_default(),
                    };
                }
            }

            return DriverResponse::Other(Bson::Document(document));
        }

        if document.contains_key("_id") {
            return DriverResponse::Found(document);
        }

        DriverResponse::Other(Bson::Document(document))
    }

    /// Converts the response into model instances.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`] if a document does not fit `M`.
    pub fn into_models<M: Model>(self) -> ModelResult<Normalized<M>> {
        Ok(match self {
            DriverResponse::Found(document) => Normalized::One(M::from_document(document)?),
            DriverResponse::NotFound => Normalized::Empty,
            DriverResponse::Many(documents) | DriverResponse::Written { ops: documents } => {
                Normalized::Many(
                    documents
                        .into_iter()
                        .map(M::from_document)
                        .collect::<ModelResult<Vec<_>>>()?,
                )
            }
            DriverResponse::Other(raw) => Normalized::Raw(raw),
        })
    }
}

impl From<Bson> for DriverResponse {
    fn from(raw: Bson) -> Self {
        DriverResponse::classify(raw)
    }
}

impl From<Document> for DriverResponse {
    fn from(document: Document) -> Self {
        DriverResponse::Found(document)
    }
}

impl From<Option<Document>> for DriverResponse {
    fn from(document: Option<Document>) -> Self {
        match document {
            Some(document) => DriverResponse::Found(document),
            None => DriverResponse::NotFound,
        }
    }
}

impl From<Vec<Document>> for DriverResponse {
    fn from(documents: Vec<Document>) -> Self {
        DriverResponse::Many(documents)
    }
}

impl From<ModifyResult> for DriverResponse {
    fn from(result: ModifyResult) -> Self {
        result.value.into()
    }
}

impl From<InsertOneResult> for DriverResponse {
    fn from(result: InsertOneResult) -> Self {
        DriverResponse::Written { ops: result.ops }
    }
}

impl From<InsertManyResult> for DriverResponse {
    fn from(result: InsertManyResult) -> Self {
        DriverResponse::Written { ops: result.ops }
    }
}

impl From<u64> for DriverResponse {
    fn from(count: u64) -> Self {
        // Counts above i64::MAX cannot come from a real collection
        DriverResponse::Other(Bson::Int64(i64::try_from(count).unwrap_or(i64::MAX)))
    }
}

/// A driver response after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<M> {
    /// A single model instance.
    One(M),
    /// Model instances in driver order.
    Many(Vec<M>),
    /// Nothing matched.
    Empty,
    /// A value that is not document shaped, unchanged.
    Raw(Bson),
}

impl<M> Normalized<M> {
    /// Returns the single instance, if any.
    pub fn one(self) -> Option<M> {
        match self {
            Normalized::One(model) => Some(model),
            _ => None,
        }
    }

    /// Returns the instances as a list; a single instance becomes a one element list.
    pub fn many(self) -> Vec<M> {
        match self {
            Normalized::One(model) => vec![model],
            Normalized::Many(models) => models,
            Normalized::Empty | Normalized::Raw(_) => Vec::new(),
        }
    }

    /// Whether the driver returned nothing to convert.
    pub fn is_empty(&self) -> bool {
        matches!(self, Normalized::Empty)
    }
}

/// Normalizes the outcome of a driver call, forwarding errors unchanged.
pub fn normalize<M, R>(result: ModelResult<R>) -> ModelResult<Normalized<M>>
where
    M: Model,
    R: Into<DriverResponse>,
{
    result?.into().into_models()
}

/// Callback-style adapter around [`normalize`].
///
/// When `error` is set, `next` receives it together with the raw value untouched.
/// Otherwise `next` receives the normalized value; should a document not fit `M`, the
/// conversion error is reported the same way, alongside the raw value.
pub fn result_factory<M, F, T>(next: F, error: Option<ModelError>, raw: Bson) -> T
where
    M: Model,
    F: FnOnce(Option<ModelError>, Normalized<M>) -> T,
{
    if let Some(err) = error {
        return next(Some(err), Normalized::Raw(raw));
    }

    match DriverResponse::classify(raw.clone()).into_models::<M>() {
        Ok(normalized) => next(None, normalized),
        Err(err) => next(Some(err), Normalized::Raw(raw)),
    }
}

fn documents_of(items: Vec<Bson>) -> Result<Vec<Document>, Vec<Bson>> {
    if !items.iter().all(|item| matches!(item, Bson::Document(_))) {
        return Err(items);
    }

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Bson::Document(document) => Some(document),
            _ => None,
        })
        .collect())
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(flag) => *flag,
        Bson::Int32(number) => *number != 0,
        Bson::Int64(number) => *number != 0,
        Bson::Double(number) => *number != 0.0 && !number.is_nan(),
        Bson::String(text) => !text.is_empty(),
        _ => true,
    }
}
