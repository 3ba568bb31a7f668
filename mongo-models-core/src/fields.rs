//! Field and sort specification parsing.
//!
//! Projections and sort orders can be written as whitespace separated token strings:
//!
//! ```ignore
//! use mongo_models::fields::{parse_fields, parse_sort};
//!
//! // { "name": true, "secret": false }
//! let projection = parse_fields("name -secret");
//!
//! // { "age": -1, "name": 1 }
//! let sort = parse_sort("-age name");
//! ```
//!
//! A token starting with `-` excludes the field (projection) or sorts it descending.
//! Already structured documents pass through unchanged.

use bson::{Bson, Document};

/// A projection or sort specification, either as text or as a ready document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldSpec {
    /// Whitespace separated tokens such as `"name -password"`.
    Text(String),
    /// A document already in driver shape.
    Document(Document),
    /// No specification.
    #[default]
    None,
}

impl FieldSpec {
    /// Returns `true` if the specification selects nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldSpec::Text(text) => text.trim().is_empty(),
            FieldSpec::Document(doc) => doc.is_empty(),
            FieldSpec::None => true,
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(value: &str) -> Self {
        FieldSpec::Text(value.to_string())
    }
}

impl From<String> for FieldSpec {
    fn from(value: String) -> Self {
        FieldSpec::Text(value)
    }
}

impl From<Document> for FieldSpec {
    fn from(value: Document) -> Self {
        FieldSpec::Document(value)
    }
}

impl<T: Into<FieldSpec>> From<Option<T>> for FieldSpec {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Parses a projection specification into a document of inclusion flags.
///
/// `"one -two three"` becomes `{ "one": true, "two": false, "three": true }`.
/// An empty string yields an empty document.
pub fn parse_fields(spec: impl Into<FieldSpec>) -> Document {
    parse_with(spec.into(), |descending| Bson::Boolean(!descending))
}

/// Parses a sort specification into a document of directions.
///
/// `"one -two three"` becomes `{ "one": 1, "two": -1, "three": 1 }`.
/// An empty string yields an empty document.
pub fn parse_sort(spec: impl Into<FieldSpec>) -> Document {
    parse_with(spec.into(), |descending| Bson::Int32(if descending { -1 } else { 1 }))
}

fn parse_with(spec: FieldSpec, flag: impl Fn(bool) -> Bson) -> Document {
    match spec {
        FieldSpec::Document(doc) => doc,
        FieldSpec::None => Document::new(),
        FieldSpec::Text(text) => {
            let mut document = Document::new();

            for token in text.split_whitespace() {
                let (name, descending) = match token.strip_prefix('-') {
                    Some(name) => (name, true),
                    None => (token, false),
                };

                // A lone "-" names no field
                if name.is_empty() {
                    continue;
                }

                // Last occurrence wins, for the value and for the key position
                document.remove(name);
                document.insert(name, flag(descending));
            }

            document
        }
    }
}
