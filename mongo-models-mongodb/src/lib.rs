//! MongoDB driver adapter for mongo-models.
//!
//! This crate provides a MongoDB-based implementation of the `Backend` trait. Every
//! operation is a direct passthrough to the official async driver: filters, updates and
//! pipelines are sent as given.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mongo-models = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Pool settings** - App name, pool sizes and timeouts from [`ClientConfig`](mongo_models_core::config::ClientConfig)
//! - **Startup check** - The builder pings the server before handing out a backend
//! - **Inserted documents** - `_id`s are assigned client-side so inserts echo the stored documents
//! - **Indexes** - Declared indexes are created with their names and uniqueness
//!
//! # Example
//!
//! ```ignore
//! use mongo_models::{connection::Connection, mongodb::MongoDbBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Connection::connect(
//!         MongoDbBackend::builder("mongodb://localhost:27017", "my_database")
//!     )
//!     .await?;
//!
//!     connection.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongo_models_mongodb;

pub mod store;

pub use store::{MongoDbBackend, MongoDbBackendBuilder};
