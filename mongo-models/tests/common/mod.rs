#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use mongo_models::{
    bson::{Bson, Document, doc, oid::ObjectId},
    memory::InMemoryBackend,
    prelude::*,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[model(collection = "dummies", schema = "cartoon_schema", indexes = "cartoon_indexes")]
pub struct Cartoon {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub group: String,
    pub count: i32,
}

pub fn cartoon_schema() -> Schema {
    Schema::new()
        .optional("_id", FieldType::ObjectId)
        .required("name", FieldType::String)
        .required("group", FieldType::String)
        .required("count", FieldType::Int)
}

pub fn cartoon_indexes() -> Vec<IndexSpec> {
    vec![IndexSpec::new("name").unique(), IndexSpec::new("group -count")]
}

/// A model with no indexes, named by the derive default.
#[derive(Debug, Clone, Serialize, Deserialize, Model)]
pub struct SideKick {
    pub name: String,
}

pub fn cartoons() -> Vec<Document> {
    vec![
        doc! { "name": "Ren", "group": "Friend", "count": 100 },
        doc! { "name": "Stimpy", "group": "Friend", "count": 10 },
        doc! { "name": "Yak", "group": "Foe", "count": 430 },
    ]
}

pub async fn seeded() -> Connection {
    let connection = Connection::new(InMemoryBackend::new());
    connection
        .model::<Cartoon>()
        .insert_many(cartoons())
        .await
        .unwrap();
    connection
}

/// Wraps the in-memory adapter, recording every call and failing the ones it is told to.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    inner: InMemoryBackend,
    calls: Arc<AtomicUsize>,
    operations: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
    closed: Arc<AtomicUsize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, operation: &'static str) -> Self {
        self.failing.lock().unwrap().insert(operation);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &'static str) -> ModelResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.operations.lock().unwrap().push(operation.to_string());

        if self.failing.lock().unwrap().contains(operation) {
            return Err(ModelError::backend(format!("{operation} failed")));
        }

        Ok(())
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn count(&self, collection: &str, filter: Document, options: CountOptions) -> ModelResult<u64> {
        self.record("count")?;
        self.inner.count(collection, filter, options).await
    }

    async fn distinct(&self, collection: &str, field: &str, filter: Document) -> ModelResult<Vec<Bson>> {
        self.record("distinct")?;
        self.inner.distinct(collection, field, filter).await
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> ModelResult<Vec<Document>> {
        self.record("find")?;
        self.inner.find(collection, filter, options).await
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOneOptions) -> ModelResult<Option<Document>> {
        self.record("find_one")?;
        self.inner.find_one(collection, filter, options).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        self.record("find_one_and_update")?;
        self.inner.find_one_and_update(collection, filter, update, options).await
    }

    async fn find_one_and_replace(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        self.record("find_one_and_replace")?;
        self.inner.find_one_and_replace(collection, filter, replacement, options).await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> ModelResult<ModifyResult> {
        self.record("find_one_and_delete")?;
        self.inner.find_one_and_delete(collection, filter, options).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> ModelResult<InsertOneResult> {
        self.record("insert_one")?;
        self.inner.insert_one(collection, document).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> ModelResult<InsertManyResult> {
        self.record("insert_many")?;
        self.inner.insert_many(collection, documents).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        self.record("update_one")?;
        self.inner.update_one(collection, filter, update, options).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        self.record("update_many")?;
        self.inner.update_many(collection, filter, update, options).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        self.record("replace_one")?;
        self.inner.replace_one(collection, filter, replacement, options).await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult> {
        self.record("delete_one")?;
        self.inner.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult> {
        self.record("delete_many")?;
        self.inner.delete_many(collection, filter).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> ModelResult<Vec<Document>> {
        self.record("aggregate")?;
        self.inner.aggregate(collection, pipeline, options).await
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> ModelResult<Vec<String>> {
        self.record("create_indexes")?;
        self.inner.create_indexes(collection, indexes).await
    }

    async fn close(&self) -> ModelResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a prepared [`RecordingBackend`], or fails like an unreachable server.
pub struct RecordingBuilder {
    backend: Option<RecordingBackend>,
}

impl RecordingBuilder {
    pub fn new(backend: &RecordingBackend) -> Self {
        Self {
            backend: Some(backend.clone()),
        }
    }

    pub fn unreachable() -> Self {
        Self { backend: None }
    }
}

#[async_trait]
impl BackendBuilder for RecordingBuilder {
    type Backend = RecordingBackend;

    async fn build(self) -> ModelResult<Self::Backend> {
        self.backend
            .ok_or_else(|| ModelError::Initialization("connection refused".to_string()))
    }
}
