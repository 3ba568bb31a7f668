mod common;

use common::{Cartoon, RecordingBackend, RecordingBuilder, SideKick};
use mongo_models::{
    bson::doc,
    memory::InMemoryBackend,
    prelude::*,
};

fn config(auto_index: bool) -> ModelsConfig {
    ModelsConfig::new("mongodb://localhost:27017", "toons").with_auto_index(auto_index)
}

#[tokio::test]
async fn start_creates_declared_indexes() {
    let backend = RecordingBackend::new();
    let registry = ModelRegistry::new(config(true));
    registry.add_model::<Cartoon>("Cartoon").await.unwrap();
    registry.add_model::<SideKick>("SideKick").await.unwrap();

    registry.start(RecordingBuilder::new(&backend)).await.unwrap();

    // SideKick declares no indexes and is skipped
    assert_eq!(backend.operations(), vec!["create_indexes"]);
    assert_eq!(registry.model_names().await, vec!["Cartoon", "SideKick"]);
}

#[tokio::test]
async fn auto_index_off_skips_indexing() {
    let backend = RecordingBackend::new();
    let registry = ModelRegistry::new(config(false));
    registry.add_model::<Cartoon>("Cartoon").await.unwrap();

    let connection = registry.start(RecordingBuilder::new(&backend)).await.unwrap();

    assert!(backend.operations().is_empty());
    assert_eq!(connection.model::<Cartoon>().count(doc! {}, None).await.unwrap(), 0);
}

#[tokio::test]
async fn models_added_after_start_are_indexed() {
    let backend = RecordingBackend::new();
    let registry = ModelRegistry::new(config(true));

    registry.start(RecordingBuilder::new(&backend)).await.unwrap();
    assert!(backend.operations().is_empty());

    registry.add_model::<Cartoon>("Cartoon").await.unwrap();

    assert_eq!(backend.operations(), vec!["create_indexes"]);
    let descriptor = registry.descriptor("Cartoon").await.unwrap();
    assert_eq!(descriptor.collection, "dummies");
    assert_eq!(descriptor.indexes.len(), 2);
}

#[tokio::test]
async fn connect_failure_leaves_registry_unconnected() {
    let registry = ModelRegistry::new(config(true));
    registry.add_model::<Cartoon>("Cartoon").await.unwrap();

    let result = registry.start(RecordingBuilder::unreachable()).await;

    assert!(matches!(result, Err(ModelError::Initialization(_))));
    assert!(matches!(registry.connection().await, Err(ModelError::NotConnected)));
}

#[tokio::test]
async fn index_failures_are_returned() {
    let backend = RecordingBackend::new().failing("create_indexes");
    let registry = ModelRegistry::new(config(true));
    registry.add_model::<Cartoon>("Cartoon").await.unwrap();

    let result = registry.start(RecordingBuilder::new(&backend)).await;

    assert!(matches!(result, Err(ModelError::Backend(_))));
    assert!(registry.connection().await.is_ok());
}

#[tokio::test]
async fn stop_closes_the_connection() {
    let backend = RecordingBackend::new();
    let registry = ModelRegistry::new(config(true));

    registry.start(RecordingBuilder::new(&backend)).await.unwrap();
    registry.stop().await.unwrap();
    registry.stop().await.unwrap();

    assert_eq!(backend.closed(), 1);
    assert!(matches!(registry.connection().await, Err(ModelError::NotConnected)));
}

#[tokio::test]
async fn unknown_models_are_reported() {
    let registry = ModelRegistry::new(config(true));

    let result = registry.descriptor("Nobody").await;

    assert!(matches!(result, Err(ModelError::UnknownModel(name)) if name == "Nobody"));
}

#[tokio::test]
async fn slot_reconnect_closes_previous_connection() {
    let first = RecordingBackend::new();
    let second = RecordingBackend::new();
    let slot = ConnectionSlot::new();

    assert!(!slot.is_connected().await);

    slot.connect(RecordingBuilder::new(&first)).await.unwrap();
    slot.connect(RecordingBuilder::new(&second)).await.unwrap();

    assert_eq!(first.closed(), 1);
    assert_eq!(second.closed(), 0);
    assert!(slot.is_connected().await);

    slot.disconnect().await.unwrap();
    assert_eq!(second.closed(), 1);
    assert!(!slot.is_connected().await);
}

#[tokio::test]
async fn shared_memory_backend_across_connections() {
    let backend = InMemoryBackend::new();

    let writer = Connection::connect(InMemoryBackend::builder().shared(&backend)).await.unwrap();
    let reader = Connection::connect(InMemoryBackend::builder().shared(&backend)).await.unwrap();

    writer
        .model::<SideKick>()
        .insert_one(doc! { "name": "Kowalski" })
        .await
        .unwrap();

    assert_eq!(reader.model::<SideKick>().name(), "side_kicks");
    assert_eq!(reader.model::<SideKick>().count(doc! {}, None).await.unwrap(), 1);
}

#[test]
fn config_from_json() {
    let config = ModelsConfig::from_json_str(
        r#"{
            "mongodb": {
                "uri": "mongodb://localhost:27017",
                "database": "toons",
                "options": { "appName": "toons", "maxPoolSize": 5 }
            }
        }"#,
    )
    .unwrap();

    assert!(config.auto_index);
    assert_eq!(config.mongodb.options.app_name.as_deref(), Some("toons"));
    assert_eq!(config.mongodb.options.max_pool_size, Some(5));
}
