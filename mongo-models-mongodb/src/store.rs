use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{self as driver, ClientOptions, IndexOptions, ReturnDocument},
};
use tracing::{debug, info};

use mongo_models_core::{
    backend::{Backend, BackendBuilder},
    config::{ClientConfig, MongoConfig},
    error::{ModelError, ModelResult},
    options::{
        AggregateOptions, CountOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexSpec, UpdateOptions,
    },
    results::{DeleteResult, InsertManyResult, InsertOneResult, ModifyResult, UpdateResult},
};


#[derive(Debug, Clone)]
pub struct MongoDbBackend {
    client: Client,
    database: String,
}

impl MongoDbBackend {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbBackendBuilder {
        MongoDbBackendBuilder::new(uri, database)
    }

    /// The underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

/// Gives `document` an `_id` before it is sent, so inserted documents can be echoed back.
fn with_id(document: Document) -> (Bson, Document) {
    match document.get("_id").cloned() {
        Some(id) => (id, document),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            let mut stored = doc! { "_id": id.clone() };
            for (key, value) in document {
                stored.insert(key, value);
            }

            (id, stored)
        }
    }
}

fn modify_options(options: &FindOneAndModifyOptions) -> (Option<Document>, Option<Document>, Option<bool>, ReturnDocument) {
    (
        options.projection.clone(),
        options.sort.clone(),
        Some(options.upsert),
        if options.return_original {
            ReturnDocument::Before
        } else {
            ReturnDocument::After
        },
    )
}

fn index_model(index: IndexSpec) -> IndexModel {
    let mut options = IndexOptions::default();
    options.name = index.name;
    options.unique = index.unique.then_some(true);

    IndexModel::builder()
        .keys(index.keys)
        .options(options)
        .build()
}

#[async_trait]
impl Backend for MongoDbBackend {
    async fn count(&self, collection: &str, filter: Document, options: CountOptions) -> ModelResult<u64> {
        let mut count_options = driver::CountOptions::default();
        count_options.limit = options.limit;
        count_options.skip = options.skip;

        self.get_collection(collection)
            .count_documents(filter)
            .with_options(count_options)
            .await
            .map_err(ModelError::backend)
    }

    async fn distinct(&self, collection: &str, field: &str, filter: Document) -> ModelResult<Vec<Bson>> {
        self.get_collection(collection)
            .distinct(field, filter)
            .await
            .map_err(ModelError::backend)
    }

    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> ModelResult<Vec<Document>> {
        let mut find_options = driver::FindOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.limit = options.limit;
        find_options.skip = options.skip;

        self.get_collection(collection)
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(ModelError::backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(ModelError::backend)
    }

    async fn find_one(&self, collection: &str, filter: Document, options: FindOneOptions) -> ModelResult<Option<Document>> {
        let mut find_options = driver::FindOneOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.skip = options.skip;

        self.get_collection(collection)
            .find_one(filter)
            .with_options(find_options)
            .await
            .map_err(ModelError::backend)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        let (projection, sort, upsert, return_document) = modify_options(&options);

        let mut update_options = driver::FindOneAndUpdateOptions::default();
        update_options.projection = projection;
        update_options.sort = sort;
        update_options.upsert = upsert;
        update_options.return_document = Some(return_document);

        Ok(
            self.get_collection(collection)
                .find_one_and_update(filter, update)
                .with_options(update_options)
                .await
                .map_err(ModelError::backend)?
                .into()
        )
    }

    async fn find_one_and_replace(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: FindOneAndModifyOptions,
    ) -> ModelResult<ModifyResult> {
        let (projection, sort, upsert, return_document) = modify_options(&options);

        let mut replace_options = driver::FindOneAndReplaceOptions::default();
        replace_options.projection = projection;
        replace_options.sort = sort;
        replace_options.upsert = upsert;
        replace_options.return_document = Some(return_document);

        Ok(
            self.get_collection(collection)
                .find_one_and_replace(filter, replacement)
                .with_options(replace_options)
                .await
                .map_err(ModelError::backend)?
                .into()
        )
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> ModelResult<ModifyResult> {
        let mut delete_options = driver::FindOneAndDeleteOptions::default();
        delete_options.projection = options.projection;
        delete_options.sort = options.sort;

        Ok(
            self.get_collection(collection)
                .find_one_and_delete(filter)
                .with_options(delete_options)
                .await
                .map_err(ModelError::backend)?
                .into()
        )
    }

    async fn insert_one(&self, collection: &str, document: Document) -> ModelResult<InsertOneResult> {
        let (_, document) = with_id(document);

        let result = self.get_collection(collection)
            .insert_one(&document)
            .await
            .map_err(ModelError::backend)?;

        Ok(InsertOneResult {
            inserted_id: result.inserted_id,
            ops: vec![document],
        })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> ModelResult<InsertManyResult> {
        let (inserted_ids, ops): (Vec<Bson>, Vec<Document>) = documents.into_iter().map(with_id).unzip();

        let result = self.get_collection(collection)
            .insert_many(&ops)
            .await
            .map_err(ModelError::backend)?;

        debug!(collection, count = result.inserted_ids.len(), "inserted documents");

        Ok(InsertManyResult { inserted_ids, ops })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        let mut update_options = driver::UpdateOptions::default();
        update_options.upsert = Some(options.upsert);

        let result = self.get_collection(collection)
            .update_one(filter, update)
            .with_options(update_options)
            .await
            .map_err(ModelError::backend)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        let mut update_options = driver::UpdateOptions::default();
        update_options.upsert = Some(options.upsert);

        let result = self.get_collection(collection)
            .update_many(filter, update)
            .with_options(update_options)
            .await
            .map_err(ModelError::backend)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> ModelResult<UpdateResult> {
        let mut replace_options = driver::ReplaceOptions::default();
        replace_options.upsert = Some(options.upsert);

        let result = self.get_collection(collection)
            .replace_one(filter, replacement)
            .with_options(replace_options)
            .await
            .map_err(ModelError::backend)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult> {
        let result = self.get_collection(collection)
            .delete_one(filter)
            .await
            .map_err(ModelError::backend)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<DeleteResult> {
        let result = self.get_collection(collection)
            .delete_many(filter)
            .await
            .map_err(ModelError::backend)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> ModelResult<Vec<Document>> {
        let mut aggregate_options = driver::AggregateOptions::default();
        aggregate_options.allow_disk_use = options.allow_disk_use;
        aggregate_options.batch_size = options.batch_size;

        self.get_collection(collection)
            .aggregate(pipeline)
            .with_options(aggregate_options)
            .await
            .map_err(ModelError::backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(ModelError::backend)
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> ModelResult<Vec<String>> {
        Ok(
            self.get_collection(collection)
                .create_indexes(indexes.into_iter().map(index_model))
                .await
                .map_err(ModelError::backend)?
                .index_names
        )
    }

    async fn close(&self) -> ModelResult<()> {
        self.client.clone().shutdown().await;

        info!(database = %self.database, "closed mongodb connection");

        Ok(())
    }
}

/// Builder for [`MongoDbBackend`]; parses the URI, applies pool settings and verifies the
/// server with a `ping` before handing out the backend.
pub struct MongoDbBackendBuilder {
    uri: String,
    database: String,
    options: ClientConfig,
}

impl MongoDbBackendBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            options: ClientConfig::default(),
        }
    }

    pub fn from_config(config: &MongoConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            database: config.database.clone(),
            options: config.options.clone(),
        }
    }

    pub fn with_options(mut self, options: ClientConfig) -> Self {
        self.options = options;
        self
    }

    fn apply(&self, client_options: &mut ClientOptions) {
        if let Some(app_name) = &self.options.app_name {
            client_options.app_name = Some(app_name.clone());
        }
        if let Some(min_pool_size) = self.options.min_pool_size {
            client_options.min_pool_size = Some(min_pool_size);
        }
        if let Some(max_pool_size) = self.options.max_pool_size {
            client_options.max_pool_size = Some(max_pool_size);
        }
        if let Some(timeout) = self.options.connect_timeout() {
            client_options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = self.options.server_selection_timeout() {
            client_options.server_selection_timeout = Some(timeout);
        }
    }
}

#[async_trait]
impl BackendBuilder for MongoDbBackendBuilder {
    type Backend = MongoDbBackend;

    async fn build(self) -> ModelResult<Self::Backend> {
        let mut client_options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| ModelError::Initialization(e.to_string()))?;
        self.apply(&mut client_options);

        let client = Client::with_options(client_options)
            .map_err(|e| ModelError::Initialization(e.to_string()))?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ModelError::Initialization(e.to_string()))?;

        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbBackend::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_id_keeps_existing_id() {
        let (id, document) = with_id(doc! { "_id": 7, "name": "Ren" });

        assert_eq!(id, Bson::Int32(7));
        assert_eq!(document, doc! { "_id": 7, "name": "Ren" });
    }

    #[test]
    fn with_id_prepends_generated_id() {
        let (id, document) = with_id(doc! { "name": "Ren" });

        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(document.keys().collect::<Vec<_>>(), vec!["_id", "name"]);
    }

    #[test]
    fn modify_options_return_new_document_by_default() {
        let (_, _, upsert, return_document) = modify_options(&FindOneAndModifyOptions::default());

        assert_eq!(upsert, Some(false));
        assert!(matches!(return_document, ReturnDocument::After));

        let (_, _, _, return_document) =
            modify_options(&FindOneAndModifyOptions::default().with_return_original(true));
        assert!(matches!(return_document, ReturnDocument::Before));
    }

    #[test]
    fn index_model_carries_name_and_uniqueness() {
        let model = index_model(IndexSpec::new("name -count").named("by_name").unique());

        assert_eq!(model.keys, doc! { "name": 1, "count": -1 });
        let options = model.options.unwrap();
        assert_eq!(options.name.as_deref(), Some("by_name"));
        assert_eq!(options.unique, Some(true));
    }

    #[test]
    fn builder_applies_client_config() {
        let mut config = MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "cartoons".to_string(),
            options: ClientConfig::default(),
        };
        config.options.app_name = Some("mongo-models".to_string());
        config.options.max_pool_size = Some(5);
        config.options.connect_timeout_ms = Some(1500);

        let builder = MongoDbBackendBuilder::from_config(&config);
        let mut client_options = ClientOptions::default();
        builder.apply(&mut client_options);

        assert_eq!(client_options.app_name.as_deref(), Some("mongo-models"));
        assert_eq!(client_options.max_pool_size, Some(5));
        assert_eq!(client_options.connect_timeout, Some(std::time::Duration::from_millis(1500)));
        assert_eq!(client_options.min_pool_size, None);
    }
}
