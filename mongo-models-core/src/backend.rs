//! Driver adapter abstraction.
//!
//! This module defines the seam between the model layer and a concrete document database
//! driver. The [`Backend`] trait mirrors the collection operations of a MongoDB-style driver,
//! addressed by collection name. It is object safe so a [`Connection`](crate::connection::Connection)
//! can hold any adapter behind an `Arc<dyn Backend>`.
//!
//! # Traits
//!
//! - [`Backend`]: The driver adapter
//! - [`BackendBuilder`]: Asynchronous factory that opens an adapter
//!
//! # Examples
//!
//! ```ignore
//! use mongo_models::{backend::BackendBuilder, memory::InMemoryBackend};
//! use bson::doc;
//!
//! let backend = InMemoryBackend::builder().build().await?;
//! backend.insert_one("users", doc! { "name": "Ren" }).await?;
//! assert_eq!(backend.count("users", doc! {}, Default::default()).await?, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{
    error::ModelResult,
    options::{
        AggregateOptions, CountOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexSpec, UpdateOptions,
    },
    results::{DeleteResult, InsertManyResult, InsertOneResult, ModifyResult, UpdateResult},
};

/// Abstract interface for document database drivers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single adapter is shared by every model
/// collection handed out by a connection.
///
/// # Error Handling
///
/// Driver failures must be returned as [`ModelError::Backend`](crate::error::ModelError::Backend)
/// carrying the original error. Callers never reclassify them.
///
/// # Inserts
///
/// Documents lacking an `_id` are assigned a fresh `ObjectId` before being stored. The
/// stored documents are returned as `ops` so callers can build model instances from them.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Counts documents matching `filter`.
    async fn count(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> ModelResult<u64>;

    /// Lists the distinct values of `field` across documents matching `filter`.
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> ModelResult<Vec<Bson>>;

    /// Returns every document matching `filter`, windowed and ordered by `options`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> ModelResult<Vec<Document>>;

    /// Returns the first document matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneOptions,
    ) -> ModelResult<Option<Document>>;

    /// Applies `update` to the first matching document.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult>;

    /// Replaces the first matching document with `replacement`.
    async fn find_one_and_replace(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult>;

    /// Removes the first matching document and returns it.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> ModelResult<ModifyResult>;

    async fn insert_one(&self, collection: &str, document: Document) -> ModelResult<InsertOneResult>;

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> ModelResult<InsertManyResult>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult>;

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult>;

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult>;

    /// Runs an aggregation pipeline and collects its output.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> ModelResult<Vec<Document>>;

    /// Creates the given indexes and returns their names.
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: Vec<IndexSpec>,
    ) -> ModelResult<Vec<String>>;

    /// Releases the driver's resources. Operations issued afterwards are undefined.
    async fn close(&self) -> ModelResult<()>;
}

/// Factory for asynchronously opening a [`Backend`].
///
/// Building performs whatever the driver needs to be usable (parsing the address,
/// reaching the server). A failed build leaves no state behind.
#[async_trait]
pub trait BackendBuilder: Send {
    type Backend: Backend;

    async fn build(self) -> ModelResult<Self::Backend>;
}
