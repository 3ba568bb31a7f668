//! Main mongo-models crate providing model classes over a MongoDB document store.
//!
//! This crate is the primary entry point for users of mongo-models. It re-exports the
//! core types from the sub-crates and gives access to the driver adapters.
//!
//! # Features
//!
//! - **Models** - Bind serde types to collections, schemas and indexes, by hand or with `#[derive(Model)]`
//! - **CRUD passthroughs** - Every collection operation of the driver, with optional options
//! - **Pagination** - `paged_find` counts and fetches concurrently and reports page metadata
//! - **Field specifications** - `"name -password"` projections and sorts
//! - **Startup wiring** - A registry that connects once and creates indexes
//!
//! # Quick Start
//!
//! ```ignore
//! use mongo_models::{prelude::*, memory::InMemoryBackend};
//! use bson::{doc, oid::ObjectId};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Model)]
//! #[model(collection = "cartoons")]
//! pub struct Cartoon {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//!     pub count: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> ModelResult<()> {
//!     let connection = Connection::connect(InMemoryBackend::builder()).await?;
//!     let cartoons = connection.model::<Cartoon>();
//!
//!     cartoons.insert_one(doc! { "name": "Ren", "count": 100 }).await?;
//!
//!     let page = cartoons
//!         .paged_find(PageRequest::new(doc! {}).with_sort("-count").with_limit(10))
//!         .await?;
//!
//!     println!("{} of {} cartoons", page.data.len(), page.items.total);
//!
//!     connection.disconnect().await
//! }
//! ```
//!
//! # Startup
//!
//! ```ignore
//! use mongo_models::{prelude::*, mongodb::MongoDbBackendBuilder};
//!
//! let config = ModelsConfig::from_json_str(r#"{
//!     "mongodb": { "uri": "mongodb://localhost:27017", "database": "toons" },
//!     "autoIndex": true
//! }"#)?;
//!
//! let registry = ModelRegistry::new(config.clone());
//! registry.add_model::<Cartoon>("Cartoon").await?;
//! registry.start(MongoDbBackendBuilder::from_config(&config.mongodb)).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory adapter for development and testing
//! - [`mongodb`] - MongoDB adapter (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as mongo_models;

pub mod prelude;

pub use mongo_models_core::{
    backend, collection, config, connection, error, fields, model, normalize, options, page,
    query, registry, results, schema,
};
pub use mongo_models_macros::Model;

// Re-export BSON types for convenience
pub use bson;

/// In-memory driver adapter.
pub mod memory {
    pub use mongo_models_memory::{InMemoryBackend, InMemoryBackendBuilder};
}

/// MongoDB driver adapter.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use mongo_models_mongodb::{MongoDbBackend, MongoDbBackendBuilder};
}
