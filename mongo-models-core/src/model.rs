//! Core traits for model types.
//!
//! A model is a serde type bound to exactly one collection and one validation schema. Both
//! are fixed at declaration time through associated functions, so every instance of a model
//! shares them.
//!
//! # Example
//!
//! ```ignore
//! use mongo_models::{model::Model, schema::{Schema, FieldType}, options::IndexSpec};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub username: String,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn schema() -> Schema {
//!         Schema::new()
//!             .optional("_id", FieldType::ObjectId)
//!             .required("username", FieldType::String)
//!     }
//!
//!     fn indexes() -> Vec<IndexSpec> {
//!         vec![IndexSpec::new("username").unique()]
//!     }
//! }
//! ```
//!
//! The same can be written with `#[derive(Model)]` and `#[model(collection = "users",
//! schema = "user_schema", indexes = "user_indexes")]`.

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::{
    error::{ModelError, ModelResult},
    options::IndexSpec,
    schema::{Schema, SchemaValidator},
};

/// Core trait that every model type implements.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the name of the collection backing this model.
    fn collection_name() -> &'static str;

    /// Returns the schema documents of this model must satisfy.
    ///
    /// Defaults to a schema accepting every document.
    fn schema() -> Schema {
        Schema::any()
    }

    /// Returns the indexes to create for this model's collection.
    fn indexes() -> Vec<IndexSpec> {
        Vec::new()
    }
}

/// Conversion and validation helpers, implemented for every [`Model`].
pub trait ModelExt: Model {
    /// Builds an instance from a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`] if the document does not fit the model.
    fn from_document(document: Document) -> ModelResult<Self>;

    /// Serializes this instance into a document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`] if the model does not serialize to a map.
    fn to_document(&self) -> ModelResult<Document>;

    fn to_json(&self) -> ModelResult<Value>;

    fn from_json(value: Value) -> ModelResult<Self>;

    /// Validates this instance against [`Model::schema`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] listing every violation.
    fn validate(&self) -> ModelResult<()>;

    /// Validates an arbitrary document against [`Model::schema`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] listing every violation.
    fn validate_document(document: &Document) -> ModelResult<()>;
}

impl<M: Model> ModelExt for M {
    fn from_document(document: Document) -> ModelResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_document(&self) -> ModelResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(ModelError::Serialization(format!(
                "{} serialized to {:?}, expected a document",
                M::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn to_json(&self) -> ModelResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> ModelResult<Self> {
        Ok(from_value(value)?)
    }

    fn validate(&self) -> ModelResult<()> {
        M::validate_document(&self.to_document()?)
    }

    fn validate_document(document: &Document) -> ModelResult<()> {
        let report = M::schema().validate(document);

        if report.is_valid() {
            Ok(())
        } else {
            Err(ModelError::Validation(report))
        }
    }
}

/// Conversion into an `ObjectId`, used by the by-id operations.
///
/// Conversion happens before any driver call; a failure surfaces as
/// [`ModelError::InvalidId`].
pub trait IntoObjectId {
    fn into_object_id(self) -> ModelResult<ObjectId>;
}

impl IntoObjectId for ObjectId {
    fn into_object_id(self) -> ModelResult<ObjectId> {
        Ok(self)
    }
}

impl IntoObjectId for &ObjectId {
    fn into_object_id(self) -> ModelResult<ObjectId> {
        Ok(*self)
    }
}

impl IntoObjectId for &str {
    fn into_object_id(self) -> ModelResult<ObjectId> {
        ObjectId::parse_str(self).map_err(|e| ModelError::InvalidId(format!("{self}: {e}")))
    }
}

impl IntoObjectId for String {
    fn into_object_id(self) -> ModelResult<ObjectId> {
        self.as_str().into_object_id()
    }
}

impl IntoObjectId for &String {
    fn into_object_id(self) -> ModelResult<ObjectId> {
        self.as_str().into_object_id()
    }
}

impl IntoObjectId for Bson {
    fn into_object_id(self) -> ModelResult<ObjectId> {
        match self {
            Bson::ObjectId(id) => Ok(id),
            Bson::String(text) => text.into_object_id(),
            other => Err(ModelError::InvalidId(format!(
                "cannot convert {:?} to an ObjectId",
                other.element_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;

    use super::*;
    use crate::schema::FieldType;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
        id: Option<ObjectId>,
        name: String,
    }

    impl Model for Dummy {
        fn collection_name() -> &'static str {
            "dummies"
        }

        fn schema() -> Schema {
            Schema::new()
                .optional("_id", FieldType::ObjectId)
                .required("name", FieldType::String)
        }
    }

    #[test]
    fn document_round_trip_keeps_id() {
        let id = ObjectId::new();
        let dummy = Dummy::from_document(doc! { "_id": id, "name": "Ren" }).unwrap();

        assert_eq!(dummy.id, Some(id));
        assert_eq!(dummy.to_document().unwrap(), doc! { "_id": id, "name": "Ren" });
    }

    #[test]
    fn instance_and_static_validation() {
        let dummy = Dummy {
            id: None,
            name: "Stimpy".into(),
        };

        assert!(dummy.validate().is_ok());
        assert!(Dummy::validate_document(&doc! { "name": "Stimpy" }).is_ok());

        match Dummy::validate_document(&doc! { "name": 1 }) {
            Err(ModelError::Validation(report)) => assert_eq!(report.errors.len(), 1),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn object_id_conversion() {
        let id = ObjectId::new();

        assert_eq!(id.to_hex().into_object_id().unwrap(), id);
        assert_eq!(Bson::ObjectId(id).into_object_id().unwrap(), id);
        assert!(matches!("ZZZ".into_object_id(), Err(ModelError::InvalidId(_))));
        assert!(matches!(Bson::Int32(1).into_object_id(), Err(ModelError::InvalidId(_))));
    }
}
