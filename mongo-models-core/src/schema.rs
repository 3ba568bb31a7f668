//! Document validation.
//!
//! Validation is a collaborator contract: anything implementing [`SchemaValidator`] takes a
//! document and returns a [`ValidationReport`] listing every violation, or none. [`Schema`]
//! is the built-in implementation covering per-field types, required fields and unknown
//! keys.
//!
//! ```ignore
//! use mongo_models::schema::{Schema, FieldType};
//!
//! let schema = Schema::new()
//!     .optional("_id", FieldType::ObjectId)
//!     .required("name", FieldType::String)
//!     .optional("age", FieldType::Int);
//!
//! assert!(schema.validate(&doc! { "name": "Ren", "age": 3 }).is_valid());
//! ```

use std::fmt;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub path: String,
    /// Human readable reason.
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.path, self.message)
    }
}

/// Outcome of validating one document. An empty error list means the document is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        write!(f, "{}", messages.join(", "))
    }
}

/// Anything that can check a document against a schema.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, document: &Document) -> ValidationReport;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Document) -> ValidationReport + Send + Sync,
{
    fn validate(&self, document: &Document) -> ValidationReport {
        self(document)
    }
}

/// Accepted value type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Any,
    String,
    Bool,
    /// 32 or 64 bit integer.
    Int,
    /// Any numeric value.
    Number,
    ObjectId,
    Document,
    Array,
    DateTime,
}

impl FieldType {
    fn accepts(&self, value: &Bson) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::String => matches!(value, Bson::String(_)),
            FieldType::Bool => matches!(value, Bson::Boolean(_)),
            FieldType::Int => matches!(value, Bson::Int32(_) | Bson::Int64(_)),
            FieldType::Number => matches!(
                value,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
            ),
            FieldType::ObjectId => matches!(value, Bson::ObjectId(_)),
            FieldType::Document => matches!(value, Bson::Document(_)),
            FieldType::Array => matches!(value, Bson::Array(_)),
            FieldType::DateTime => matches!(value, Bson::DateTime(_)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::String => "a string",
            FieldType::Bool => "a boolean",
            FieldType::Int => "an integer",
            FieldType::Number => "a number",
            FieldType::ObjectId => "an ObjectId",
            FieldType::Document => "an object",
            FieldType::Array => "an array",
            FieldType::DateTime => "a date",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldRule {
    name: String,
    field_type: FieldType,
    required: bool,
}

/// Object-keys schema.
///
/// Unknown keys are rejected unless [`Schema::allow_unknown`] is set. `null` counts as a
/// missing value for required fields and is accepted for optional ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldRule>,
    allow_unknown: bool,
}

impl Schema {
    /// Creates an empty schema that rejects unknown keys.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            allow_unknown: false,
        }
    }

    /// Creates a schema that accepts every document.
    pub fn any() -> Self {
        Self {
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    pub fn required(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.rule(name.into(), field_type, true)
    }

    pub fn optional(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.rule(name.into(), field_type, false)
    }

    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    fn rule(mut self, name: String, field_type: FieldType, required: bool) -> Self {
        self.fields.retain(|rule| rule.name != name);
        self.fields.push(FieldRule {
            name,
            field_type,
            required,
        });
        self
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::any()
    }
}

impl SchemaValidator for Schema {
    fn validate(&self, document: &Document) -> ValidationReport {
        let mut errors = Vec::new();

        for rule in &self.fields {
            match document.get(&rule.name) {
                None | Some(Bson::Null) if rule.required => {
                    errors.push(ValidationError::new(&rule.name, "is required"));
                }
                None | Some(Bson::Null) => {}
                Some(value) if !rule.field_type.accepts(value) => {
                    errors.push(ValidationError::new(
                        &rule.name,
                        format!("must be {}", rule.field_type.name()),
                    ));
                }
                Some(_) => {}
            }
        }

        if !self.allow_unknown {
            for key in document.keys() {
                if !self.fields.iter().any(|rule| &rule.name == key) {
                    errors.push(ValidationError::new(key, "is not allowed"));
                }
            }
        }

        ValidationReport { errors }
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    fn dummy_schema() -> Schema {
        Schema::new()
            .optional("_id", FieldType::ObjectId)
            .required("name", FieldType::String)
            .optional("hat", FieldType::String)
    }

    #[test]
    fn accepts_valid_document() {
        let report = dummy_schema().validate(&doc! {
            "_id": ObjectId::new(),
            "name": "Stimpy",
        });

        assert!(report.is_valid());
    }

    #[test]
    fn reports_every_violation() {
        let report = dummy_schema().validate(&doc! { "hat": 3, "toy": "rubber nipple" });

        assert_eq!(
            report.errors,
            vec![
                ValidationError::new("name", "is required"),
                ValidationError::new("hat", "must be a string"),
                ValidationError::new("toy", "is not allowed"),
            ]
        );
        assert_eq!(
            report.to_string(),
            "\"name\" is required, \"hat\" must be a string, \"toy\" is not allowed"
        );
    }

    #[test]
    fn any_accepts_everything() {
        assert!(Schema::any().validate(&doc! { "whatever": [1, 2, 3] }).is_valid());
    }

    #[test]
    fn closures_are_validators() {
        let validator = |document: &Document| ValidationReport {
            errors: if document.contains_key("name") {
                vec![]
            } else {
                vec![ValidationError::new("name", "is required")]
            },
        };

        assert!(validator.validate(&doc! { "name": "Ren" }).is_valid());
        assert!(!validator.validate(&doc! {}).is_valid());
    }
}
