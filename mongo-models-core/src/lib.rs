//! Model classes over a MongoDB-style document store.
//!
//! This crate is the core of the mongo-models project and provides:
//!
//! - **Model traits** ([`model`]) - Binding a serde type to a collection, a schema and indexes
//! - **Driver adapter abstraction** ([`backend`]) - The seam to a concrete driver
//! - **Connections** ([`connection`]) - Explicit, injectable connection handles
//! - **Collections** ([`collection`]) - CRUD passthroughs, by-id lookups and paged finds
//! - **Pagination** ([`page`]) - Page requests and page metadata
//! - **Field specifications** ([`fields`]) - `"name -password"` style projections and sorts
//! - **Result normalization** ([`normalize`]) - Turning driver responses into model instances
//! - **Validation** ([`schema`]) - Schema contract and a built-in object schema
//! - **Filters** ([`query`]) - Typed filter construction
//! - **Registry** ([`registry`]) and **configuration** ([`config`]) - Startup wiring
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use mongo_models::{model::Model, connection::Connection, memory::InMemoryBackend};
//! use bson::{doc, oid::ObjectId};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//!
//! let connection = Connection::connect(InMemoryBackend::builder()).await?;
//! connection.model::<User>().insert_one(doc! { "name": "Ren" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongo_models_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod fields;
pub mod model;
pub mod normalize;
pub mod options;
pub mod page;
pub mod query;
pub mod registry;
pub mod results;
pub mod schema;
