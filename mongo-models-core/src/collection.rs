//! Model-bound collection operations.
//!
//! A [`ModelCollection`] resolves the collection named by its model and passes every call
//! through to the connection's driver adapter. Operations that take options accept either
//! `None` or an option struct; missing options fall back to each struct's defaults.
//!
//! # Example
//!
//! ```ignore
//! use mongo_models::prelude::*;
//! use bson::doc;
//!
//! # async fn example(connection: &Connection) -> ModelResult<()> {
//! let users = connection.model::<User>();
//!
//! users.insert_one(doc! { "username": "ren" }).await?;
//! let found = users.find(doc! { "username": "ren" }, None).await?;
//!
//! let page = users
//!     .paged_find(PageRequest::new(doc! {}).with_sort("-username").with_limit(10))
//!     .await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Document, doc};
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    backend::Backend,
    error::ModelResult,
    model::{IntoObjectId, Model, ModelExt},
    normalize::normalize,
    options::{
        AggregateOptions, CountOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexSpec, UpdateOptions,
    },
    page::{Page, PageRequest},
    query::Query,
    results::{DeleteResult, InsertManyResult, InsertOneResult, ModifyResult, UpdateResult},
};

/// Collection operations for the model `M`.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the connection the collection was obtained from
/// * `M` - The model type
#[derive(Debug)]
pub struct ModelCollection<'a, M: Model> {
    backend: &'a dyn Backend,
    _marker: PhantomData<M>,
}

impl<'a, M: Model> ModelCollection<'a, M> {
    pub(crate) fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Returns the name of the backing collection.
    pub fn name(&self) -> &'static str {
        M::collection_name()
    }

    /// Counts documents matching `filter`.
    pub async fn count(
        &self,
        filter: Document,
        options: impl Into<Option<CountOptions>>,
    ) -> ModelResult<u64> {
        debug!(collection = self.name(), "count");

        self.backend
            .count(self.name(), filter, options.into().unwrap_or_default())
            .await
    }

    /// Lists the distinct values of `field` among documents matching `filter`.
    pub async fn distinct(&self, field: &str, filter: Document) -> ModelResult<Vec<Bson>> {
        debug!(collection = self.name(), field, "distinct");

        self.backend.distinct(self.name(), field, filter).await
    }

    /// Returns every document matching `filter`.
    pub async fn find(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> ModelResult<Vec<Document>> {
        debug!(collection = self.name(), "find");

        self.backend
            .find(self.name(), filter, options.into().unwrap_or_default())
            .await
    }

    /// Returns the first document matching `filter`.
    pub async fn find_one(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<Document>> {
        debug!(collection = self.name(), "find_one");

        self.backend
            .find_one(self.name(), filter, options.into().unwrap_or_default())
            .await
    }

    /// Applies `update` to the first matching document.
    ///
    /// Unless `return_original` is set, the updated document is returned.
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<FindOneAndModifyOptions>>,
    ) -> ModelResult<ModifyResult> {
        debug!(collection = self.name(), "find_one_and_update");

        self.backend
            .find_one_and_update(self.name(), filter, update, options.into().unwrap_or_default())
            .await
    }

    /// Replaces the first matching document.
    ///
    /// Unless `return_original` is set, the replacement is returned.
    pub async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: impl Into<Option<FindOneAndModifyOptions>>,
    ) -> ModelResult<ModifyResult> {
        debug!(collection = self.name(), "find_one_and_replace");

        self.backend
            .find_one_and_replace(
                self.name(),
                filter,
                replacement,
                options.into().unwrap_or_default(),
            )
            .await
    }

    /// Removes the first matching document and returns it.
    pub async fn find_one_and_delete(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneAndDeleteOptions>>,
    ) -> ModelResult<ModifyResult> {
        debug!(collection = self.name(), "find_one_and_delete");

        self.backend
            .find_one_and_delete(self.name(), filter, options.into().unwrap_or_default())
            .await
    }

    /// Returns the document whose `_id` is `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidId`](crate::error::ModelError::InvalidId) without
    /// calling the driver when `id` is not a valid `ObjectId`.
    pub async fn find_by_id(
        &self,
        id: impl IntoObjectId,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<Document>> {
        let filter = self.id_filter(id)?;

        self.find_one(filter, options).await
    }

    /// Applies `update` to the document whose `_id` is `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidId`](crate::error::ModelError::InvalidId) without
    /// calling the driver when `id` is not a valid `ObjectId`.
    pub async fn find_by_id_and_update(
        &self,
        id: impl IntoObjectId,
        update: Document,
        options: impl Into<Option<FindOneAndModifyOptions>>,
    ) -> ModelResult<ModifyResult> {
        let filter = self.id_filter(id)?;

        self.find_one_and_update(filter, update, options).await
    }

    /// Removes the document whose `_id` is `id` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidId`](crate::error::ModelError::InvalidId) without
    /// calling the driver when `id` is not a valid `ObjectId`.
    pub async fn find_by_id_and_delete(
        &self,
        id: impl IntoObjectId,
        options: impl Into<Option<FindOneAndDeleteOptions>>,
    ) -> ModelResult<ModifyResult> {
        let filter = self.id_filter(id)?;

        self.find_one_and_delete(filter, options).await
    }

    pub async fn insert_one(&self, document: Document) -> ModelResult<InsertOneResult> {
        debug!(collection = self.name(), "insert_one");

        self.backend.insert_one(self.name(), document).await
    }

    pub async fn insert_many(&self, documents: Vec<Document>) -> ModelResult<InsertManyResult> {
        debug!(collection = self.name(), count = documents.len(), "insert_many");

        self.backend.insert_many(self.name(), documents).await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        debug!(collection = self.name(), "update_one");

        self.backend
            .update_one(self.name(), filter, update, options.into().unwrap_or_default())
            .await
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        debug!(collection = self.name(), "update_many");

        self.backend
            .update_many(self.name(), filter, update, options.into().unwrap_or_default())
            .await
    }

    pub async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> ModelResult<UpdateResult> {
        debug!(collection = self.name(), "replace_one");

        self.backend
            .replace_one(self.name(), filter, replacement, options.into().unwrap_or_default())
            .await
    }

    pub async fn delete_one(&self, filter: Document) -> ModelResult<DeleteResult> {
        debug!(collection = self.name(), "delete_one");

        self.backend.delete_one(self.name(), filter).await
    }

    pub async fn delete_many(&self, filter: Document) -> ModelResult<DeleteResult> {
        debug!(collection = self.name(), "delete_many");

        self.backend.delete_many(self.name(), filter).await
    }

    /// Runs an aggregation pipeline.
    pub async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> ModelResult<Vec<Document>> {
        debug!(collection = self.name(), stages = pipeline.len(), "aggregate");

        self.backend
            .aggregate(self.name(), pipeline, options.into().unwrap_or_default())
            .await
    }

    /// Runs an aggregation pipeline and hands the outcome to `callback`.
    ///
    /// Prefer [`aggregate`](Self::aggregate) when composing with other operations.
    pub async fn aggregate_with<F, T>(
        &self,
        pipeline: Vec<Document>,
        options: impl Into<Option<AggregateOptions>>,
        callback: F,
    ) -> T
    where
        F: FnOnce(ModelResult<Vec<Document>>) -> T,
    {
        callback(self.aggregate(pipeline, options).await)
    }

    /// Creates the given indexes and returns their names.
    pub async fn create_indexes(&self, indexes: Vec<IndexSpec>) -> ModelResult<Vec<String>> {
        debug!(collection = self.name(), count = indexes.len(), "create_indexes");

        self.backend.create_indexes(self.name(), indexes).await
    }

    /// Counts and fetches one page of documents concurrently.
    ///
    /// Either failure fails the whole call.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArgument`](crate::error::ModelError::InvalidArgument)
    /// when the limit is not positive, before any driver call. Driver failures are
    /// forwarded unchanged; a document that does not fit `M` fails with
    /// [`ModelError::Serialization`](crate::error::ModelError::Serialization).
    pub async fn paged_find(&self, request: PageRequest) -> ModelResult<Page<M>> {
        let (count_options, find_options) = request.plan()?;

        debug!(
            collection = self.name(),
            page = request.page,
            limit = request.limit,
            "paged_find"
        );

        let (total, documents) = futures::try_join!(
            self.backend
                .count(self.name(), request.filter.clone(), count_options),
            self.backend
                .find(self.name(), request.filter.clone(), find_options),
        )?;

        Page::assemble(documents, total, &request).try_map(M::from_document)
    }

    /// Runs a [`Query`] and returns model instances.
    pub async fn query(&self, query: Query) -> ModelResult<Vec<M>> {
        let (filter, options) = query.into_parts()?;

        self.find_models(filter, options).await
    }

    /// Like [`find`](Self::find), returning model instances.
    pub async fn find_models(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> ModelResult<Vec<M>> {
        Ok(normalize::<M, _>(self.find(filter, options).await)?.many())
    }

    /// Like [`find_one`](Self::find_one), returning a model instance.
    pub async fn find_one_model(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<M>> {
        Ok(normalize::<M, _>(self.find_one(filter, options).await)?.one())
    }

    /// Like [`find_by_id`](Self::find_by_id), returning a model instance.
    pub async fn find_model_by_id(
        &self,
        id: impl IntoObjectId,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ModelResult<Option<M>> {
        Ok(normalize::<M, _>(self.find_by_id(id, options).await)?.one())
    }

    /// Validates and inserts `model`, returning the stored instance with its `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`](crate::error::ModelError::Validation) without
    /// calling the driver when the model violates its schema.
    pub async fn insert_model(&self, model: &M) -> ModelResult<M> {
        let document = model.to_document()?;
        self.validate_document(&document)?;

        let mut stored = normalize::<M, _>(self.insert_one(document).await)?.many();

        Ok(stored.pop().unwrap_or_else(|| model.clone()))
    }

    /// Validates `document` against the model schema.
    pub fn validate_document(&self, document: &Document) -> ModelResult<()> {
        M::validate_document(document).inspect_err(|err| {
            warn!(collection = self.name(), error = %err, "document failed validation");
        })
    }

    fn id_filter(&self, id: impl IntoObjectId) -> ModelResult<Document> {
        let id = id.into_object_id().inspect_err(|err| {
            warn!(collection = self.name(), error = %err, "rejected identifier");
        })?;

        Ok(doc! { "_id": id })
    }
}
