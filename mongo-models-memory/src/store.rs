//! In-memory driver adapter.
//!
//! This module provides a backend that keeps collections as ordered lists of BSON
//! documents behind an async-safe read-write lock. Documents are returned in insertion
//! order unless a sort is requested, like a natural-order scan on the server.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document};
use tracing::debug;

use mongo_models_core::{
    backend::{Backend, BackendBuilder},
    error::{ModelError, ModelResult},
    options::{
        AggregateOptions, CountOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexSpec, UpdateOptions,
    },
    results::{DeleteResult, InsertManyResult, InsertOneResult, ModifyResult, UpdateResult},
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator},
    pipeline::{self, sort_documents},
    update::{apply_replacement, apply_update, ensure_id, get_path, project, upsert_seed},
};

type CollectionMap = Vec<Document>;
type StoreMap = HashMap<String, CollectionMap>;
type IndexMap = HashMap<String, Vec<IndexSpec>>;

/// Thread-safe in-memory document database.
///
/// # Thread Safety
///
/// `InMemoryBackend` is cloneable and uses an `Arc`-wrapped internal state, allowing it
/// to be shared across async tasks. Clones share the same data.
///
/// # Performance
///
/// Every query scans the whole collection. Declared indexes are recorded, and unique
/// indexes are enforced on insert, but they do not speed up lookups.
///
/// # Example
///
/// ```ignore
/// use mongo_models_memory::InMemoryBackend;
/// use mongo_models::backend::Backend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.insert_one("users", doc! { "name": "Ren" }).await?;
///     let found = backend.find_one("users", doc! { "name": "Ren" }, Default::default()).await?;
///     assert!(found.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryBackend {
    /// collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
    /// collection_name -> declared indexes
    indexes: Arc<RwLock<IndexMap>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory database.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            indexes: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Creates a builder, for use with `Connection::connect`.
    pub fn builder() -> InMemoryBackendBuilder {
        InMemoryBackendBuilder::default()
    }

    /// Returns the indexes declared on `collection`.
    pub async fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.indexes
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    async fn check_unique(&self, collection: &str, existing: &[Document], incoming: &[Document]) -> ModelResult<()> {
        let indexes = self.indexes.read().await;
        let unique = indexes
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|index| index.unique);

        for index in unique {
            let mut seen: Vec<Vec<Option<&Bson>>> = existing
                .iter()
                .map(|document| index_key(document, index))
                .collect();

            for document in incoming {
                let key = index_key(document, index);
                let duplicate = seen.iter().any(|other| {
                    other.len() == key.len()
                        && other.iter().zip(&key).all(|(a, b)| {
                            Comparable::from(a.unwrap_or(&Bson::Null))
                                == Comparable::from(b.unwrap_or(&Bson::Null))
                        })
                });

                if duplicate {
                    return Err(ModelError::backend(format!(
                        "E11000 duplicate key error collection: {collection} index: {}",
                        index.resolved_name()
                    )));
                }

                seen.push(key);
            }
        }

        Ok(())
    }

    /// Finds the position of the first match, after ordering by `sort`.
    fn first_match(
        documents: &[Document],
        filter: &Document,
        sort: Option<&Document>,
    ) -> ModelResult<Option<usize>> {
        let mut positions = Vec::new();

        for (position, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(filter)? {
                positions.push(position);
            }
        }

        if let Some(sort) = sort {
            let mut candidates = positions
                .iter()
                .map(|position| documents[*position].clone())
                .collect::<Vec<_>>();
            sort_documents(&mut candidates, sort);

            return Ok(candidates.first().and_then(|first| {
                positions
                    .iter()
                    .copied()
                    .find(|position| documents[*position] == *first)
            }));
        }

        Ok(positions.first().copied())
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        multi: bool,
    ) -> ModelResult<UpdateResult> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        let mut result = UpdateResult::default();

        for document in documents.iter_mut() {
            if !DocumentEvaluator::new(document).matches(&filter)? {
                continue;
            }

            let mut updated = document.clone();
            apply_update(&mut updated, &update)?;

            result.matched_count += 1;
            if updated != *document {
                *document = updated;
                result.modified_count += 1;
            }

            if !multi {
                break;
            }
        }

        if result.matched_count == 0 && options.upsert {
            let mut seed = upsert_seed(&filter)?;
            apply_update(&mut seed, &update)?;
            let (id, stored) = ensure_id(seed);

            documents.push(stored);
            result.upserted_id = Some(id);
        }

        Ok(result)
    }

    async fn delete_documents(&self, collection: &str, filter: Document, multi: bool) -> ModelResult<DeleteResult> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };

        let mut doomed = Vec::new();

        for (position, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                doomed.push(position);
                if !multi {
                    break;
                }
            }
        }

        for position in doomed.iter().rev() {
            documents.remove(*position);
        }

        Ok(DeleteResult {
            deleted_count: doomed.len() as u64,
        })
    }

    async fn modify_one(
        &self,
        collection: &str,
        filter: Document,
        change: Change,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        let value = match Self::first_match(documents, &filter, options.sort.as_ref())? {
            Some(position) => {
                let original = documents[position].clone();
                let mut modified = original.clone();
                change.apply(&mut modified)?;
                documents[position] = modified.clone();

                Some(if options.return_original { original } else { modified })
            }
            None if options.upsert => {
                let mut seed = upsert_seed(&filter)?;
                change.apply(&mut seed)?;
                let (_, stored) = ensure_id(seed);
                documents.push(stored.clone());

                if options.return_original { None } else { Some(stored) }
            }
            None => None,
        };

        Ok(ModifyResult {
            value: value
                .map(|document| apply_projection(document, options.projection.as_ref()))
                .transpose()?,
        })
    }
}

enum Change {
    Update(Document),
    Replace(Document),
}

impl Change {
    fn apply(&self, document: &mut Document) -> ModelResult<()> {
        match self {
            Change::Update(update) => apply_update(document, update),
            Change::Replace(replacement) => apply_replacement(document, replacement),
        }
    }
}

fn index_key<'a>(document: &'a Document, index: &IndexSpec) -> Vec<Option<&'a Bson>> {
    index.keys.keys().map(|key| get_path(document, key)).collect()
}

fn apply_projection(document: Document, projection: Option<&Document>) -> ModelResult<Document> {
    match projection {
        Some(projection) if !projection.is_empty() => project(&document, projection),
        _ => Ok(document),
    }
}

fn window(documents: Vec<Document>, skip: Option<u64>, limit: Option<i64>) -> Vec<Document> {
    let skip = skip.unwrap_or(0) as usize;

    // A negative limit means a single batch of that size on the server
    let limit = match limit {
        Some(0) | None => usize::MAX,
        Some(limit) => limit.unsigned_abs() as usize,
    };

    documents.into_iter().skip(skip).take(limit).collect()
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn count(&self, collection: &str, filter: Document, options: CountOptions) -> ModelResult<u64> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(0);
        };

        let matched = DocumentEvaluator::filter_documents(documents, &filter)?.len() as u64;
        let matched = matched.saturating_sub(options.skip.unwrap_or(0));

        Ok(match options.limit {
            Some(limit) if limit > 0 => matched.min(limit),
            _ => matched,
        })
    }

    async fn distinct(&self, collection: &str, field: &str, filter: Document) -> ModelResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut values: Vec<Bson> = Vec::new();

        for document in DocumentEvaluator::filter_documents(documents, &filter)? {
            let found = match crate::evaluator::values_at(&document, field).as_slice() {
                [Bson::Array(items)] => items.clone(),
                found => found.iter().map(|value| (*value).clone()).collect(),
            };

            for value in found {
                if !values
                    .iter()
                    .any(|existing| Comparable::from(existing) == Comparable::from(&value))
                {
                    values.push(value);
                }
            }
        }

        Ok(values)
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> ModelResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = DocumentEvaluator::filter_documents(documents, &filter)?;

        if let Some(sort) = &options.sort {
            sort_documents(&mut matched, sort);
        }

        window(matched, options.skip, options.limit)
            .into_iter()
            .map(|document| apply_projection(document, options.projection.as_ref()))
            .collect()
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOneOptions) -> ModelResult<Option<Document>> {
        let found = self
            .find(
                collection,
                filter,
                FindOptions {
                    projection: options.projection,
                    sort: options.sort,
                    limit: Some(1),
                    skip: options.skip,
                },
            )
            .await?;

        Ok(found.into_iter().next())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        self.modify_one(collection, filter, Change::Update(update), options).await
    }

    async fn find_one_and_replace(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        self.modify_one(collection, filter, Change::Replace(replacement), options).await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> ModelResult<ModifyResult> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(ModifyResult::default());
        };

        let value = match Self::first_match(documents, &filter, options.sort.as_ref())? {
            Some(position) => Some(apply_projection(
                documents.remove(position),
                options.projection.as_ref(),
            )?),
            None => None,
        };

        Ok(ModifyResult { value })
    }

    async fn insert_one(&self, collection: &str, document: Document) -> ModelResult<InsertOneResult> {
        let (inserted_id, stored) = ensure_id(document);

        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        self.check_unique(collection, documents, std::slice::from_ref(&stored)).await?;
        documents.push(stored.clone());

        debug!(collection, "inserted one document");

        Ok(InsertOneResult {
            inserted_id,
            ops: vec![stored],
        })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> ModelResult<InsertManyResult> {
        if documents.is_empty() {
            return Err(ModelError::backend("invalid operation: documents must be a non-empty list"));
        }

        let (inserted_ids, ops): (Vec<Bson>, Vec<Document>) = documents.into_iter().map(ensure_id).unzip();

        let mut store = self.store.write().await;
        let stored = store.entry(collection.to_string()).or_default();

        self.check_unique(collection, stored, &ops).await?;
        stored.extend(ops.iter().cloned());

        debug!(collection, count = ops.len(), "inserted documents");

        Ok(InsertManyResult { inserted_ids, ops })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        self.update_documents(collection, filter, update, options, false).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        self.update_documents(collection, filter, update, options, true).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        match Self::first_match(documents, &filter, None)? {
            Some(position) => {
                let mut replaced = documents[position].clone();
                apply_replacement(&mut replaced, &replacement)?;

                let modified = replaced != documents[position];
                documents[position] = replaced;

                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                })
            }
            None if options.upsert => {
                let mut seed = upsert_seed(&filter)?;
                apply_replacement(&mut seed, &replacement)?;
                let (id, stored) = ensure_id(seed);
                documents.push(stored);

                Ok(UpdateResult {
                    upserted_id: Some(id),
                    ..UpdateResult::default()
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult> {
        self.delete_documents(collection, filter, false).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult> {
        self.delete_documents(collection, filter, true).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        _options: AggregateOptions,
    ) -> ModelResult<Vec<Document>> {
        let documents = self
            .store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        pipeline::run(documents, &pipeline)
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> ModelResult<Vec<String>> {
        let names = indexes.iter().map(IndexSpec::resolved_name).collect::<Vec<_>>();

        let mut declared = self.indexes.write().await;
        let existing = declared.entry(collection.to_string()).or_default();

        for index in indexes {
            let name = index.resolved_name();
            existing.retain(|other| other.resolved_name() != name);
            existing.push(index);
        }

        Ok(names)
    }

    async fn close(&self) -> ModelResult<()> {
        Ok(())
    }
}

/// Builder for constructing [`InMemoryBackend`] instances.
///
/// Building always succeeds with an empty database, or with a clone of `shared` so that
/// several connections can see the same data.
#[derive(Default)]
pub struct InMemoryBackendBuilder {
    shared: Option<InMemoryBackend>,
}

impl InMemoryBackendBuilder {
    /// Builds connections over an existing backend instead of a fresh one.
    pub fn shared(mut self, backend: &InMemoryBackend) -> Self {
        self.shared = Some(backend.clone());
        self
    }
}

#[async_trait]
impl BackendBuilder for InMemoryBackendBuilder {
    type Backend = InMemoryBackend;

    async fn build(self) -> ModelResult<Self::Backend> {
        Ok(self.shared.unwrap_or_default())
    }
}
