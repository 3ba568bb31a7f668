//! Error types and result types for model operations.
//!
//! Every fallible operation in this crate returns [`ModelResult<T>`]. Failures fall in
//! two groups: local failures (a malformed identifier, an invalid page request, a schema
//! violation) that are raised before the driver is reached, and driver failures that are
//! carried through [`ModelError::Backend`] with the original error kept as the source.

use std::error::Error as StdError;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::schema::ValidationReport;

/// Boxed error type used to carry driver failures unchanged.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors raised by models, collections and connections.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Serialization/deserialization error when converting between a model and a document.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during driver construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// No connection has been opened, or it was already closed.
    #[error("Not connected")]
    NotConnected,
    /// The identifier could not be converted into an `ObjectId`.
    ///
    /// Raised locally; the driver is never called.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    /// A caller supplied argument is out of range (for example a zero page limit).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The document failed schema validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),
    /// No model is registered under the given name.
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    /// The configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
    /// An error reported by the underlying driver, passed through untouched.
    #[error("Backend error: {0}")]
    Backend(#[source] BoxError),
}

impl ModelError {
    /// Wraps a driver error without inspecting it.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        ModelError::Backend(err.into())
    }

    /// Returns `true` when the error was raised before reaching the driver.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ModelError::InvalidId(_)
                | ModelError::InvalidArgument(_)
                | ModelError::Validation(_)
                | ModelError::NotConnected
        )
    }
}

/// A specialized `Result` type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ModelError {
    fn from(err: SerdeJsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_keeps_source() {
        let err = ModelError::backend("connection refused");

        assert_eq!(err.to_string(), "Backend error: connection refused");
        assert_eq!(
            err.source().map(|source| source.to_string()),
            Some("connection refused".to_string())
        );
        assert!(!err.is_local());
    }

    #[test]
    fn local_failures() {
        assert!(ModelError::InvalidId("zzz".into()).is_local());
        assert!(ModelError::InvalidArgument("limit".into()).is_local());
        assert!(!ModelError::Serialization("bad".into()).is_local());
    }
}
