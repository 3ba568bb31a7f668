//! In-memory driver adapter for mongo-models.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Backend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development and tests where a running MongoDB server is not available.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Query operators** - Implicit equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists $not $size`
//!   and the logical `$and $or $nor`
//! - **Update operators** - `$set $unset $inc $push`, replacements and upserts
//! - **Aggregation** - `$match $sort $skip $limit $project $unwind $count $group`
//!
//! # Quick Start
//!
//! ```ignore
//! use mongo_models::{connection::Connection, memory::InMemoryBackend};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Connection::connect(InMemoryBackend::builder()).await?;
//!     let users = connection.model::<User>();
//!
//!     users.insert_one(doc! { "name": "Ren" }).await?;
//!     assert_eq!(users.count(doc! {}, None).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongo_models_memory;

pub mod store;
mod evaluator;
mod pipeline;
mod update;

pub use store::{InMemoryBackend, InMemoryBackendBuilder};
