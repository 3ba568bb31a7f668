//! Convenient re-exports of commonly used types from mongo-models.
//!
//! ```ignore
//! use mongo_models::prelude::*;
//! ```

pub use mongo_models_core::{
    backend::{Backend, BackendBuilder},
    collection::ModelCollection,
    config::{ClientConfig, ModelsConfig, MongoConfig},
    connection::{Connection, ConnectionSlot},
    error::{ModelError, ModelResult},
    fields::{FieldSpec, parse_fields, parse_sort},
    model::{IntoObjectId, Model, ModelExt},
    normalize::{DriverResponse, Normalized, normalize, result_factory},
    options::{
        AggregateOptions, CountOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexSpec, UpdateOptions,
    },
    page::{Items, Page, PageRequest, Pages},
    query::{Expr, FieldOp, Filter, FilterCompiler, Query, QueryBuilder, QueryVisitor},
    registry::{ModelDescriptor, ModelRegistry},
    results::{DeleteResult, InsertManyResult, InsertOneResult, ModifyResult, UpdateResult},
    schema::{FieldType, Schema, SchemaValidator, ValidationError, ValidationReport},
};
pub use mongo_models_macros::Model;
