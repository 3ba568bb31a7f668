//! Model registration and startup.
//!
//! A [`ModelRegistry`] collects the models an application uses, opens the shared
//! connection on [`start`](ModelRegistry::start) and creates every model's indexes when
//! `autoIndex` is on. Models can be added before or after start; a model added to a
//! started registry gets its indexes right away.

use mea::rwlock::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info};

use crate::{
    backend::BackendBuilder,
    config::ModelsConfig,
    connection::{Connection, ConnectionSlot},
    error::{ModelError, ModelResult},
    model::Model,
    options::IndexSpec,
};

/// What the registry knows about one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub name: String,
    pub collection: &'static str,
    pub indexes: Vec<IndexSpec>,
}

impl ModelDescriptor {
    pub fn of<M: Model>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: M::collection_name(),
            indexes: M::indexes(),
        }
    }
}

/// Registered models plus the shared connection they use.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    config: ModelsConfig,
    slot: ConnectionSlot,
    models: Arc<RwLock<BTreeMap<String, ModelDescriptor>>>,
}

impl ModelRegistry {
    pub fn new(config: ModelsConfig) -> Self {
        Self {
            config,
            slot: ConnectionSlot::new(),
            models: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn config(&self) -> &ModelsConfig {
        &self.config
    }

    /// Registers `M` under `name`, replacing any model registered under the same name.
    ///
    /// When the registry is already started and `autoIndex` is on, the model's indexes
    /// are created before returning.
    pub async fn add_model<M: Model>(&self, name: impl Into<String>) -> ModelResult<()> {
        let descriptor = ModelDescriptor::of::<M>(name);

        debug!(model = %descriptor.name, collection = descriptor.collection, "registering model");

        if let Ok(connection) = self.slot.get().await {
            if self.config.auto_index {
                create_indexes(&connection, &descriptor).await?;
            }
        }

        self.models
            .write()
            .await
            .insert(descriptor.name.clone(), descriptor);

        Ok(())
    }

    /// Returns the registered model names in sorted order.
    pub async fn model_names(&self) -> Vec<String> {
        self.models.read().await.keys().cloned().collect()
    }

    /// Returns the descriptor registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownModel`] when nothing is registered under `name`.
    pub async fn descriptor(&self, name: &str) -> ModelResult<ModelDescriptor> {
        self.models
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))
    }

    /// Opens the shared connection and creates indexes.
    ///
    /// Models without indexes are skipped; nothing is indexed when `autoIndex` is off.
    ///
    /// # Errors
    ///
    /// Connection failures are returned as reported by the builder. Index creation
    /// failures are returned unchanged; the connection stays open.
    pub async fn start<B>(&self, builder: B) -> ModelResult<Connection>
    where
        B: BackendBuilder,
        B::Backend: 'static,
    {
        let connection = self.slot.connect(builder).await?;

        if self.config.auto_index {
            let models = self.models.read().await.values().cloned().collect::<Vec<_>>();

            for descriptor in &models {
                create_indexes(&connection, descriptor).await?;
            }
        }

        info!(models = self.models.read().await.len(), "model registry started");

        Ok(connection)
    }

    /// Returns the shared connection.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotConnected`] before [`start`](Self::start) or after
    /// [`stop`](Self::stop).
    pub async fn connection(&self) -> ModelResult<Connection> {
        self.slot.get().await
    }

    /// Closes the shared connection.
    pub async fn stop(&self) -> ModelResult<()> {
        self.slot.disconnect().await?;

        info!("model registry stopped");

        Ok(())
    }
}

async fn create_indexes(connection: &Connection, descriptor: &ModelDescriptor) -> ModelResult<()> {
    if descriptor.indexes.is_empty() {
        debug!(model = %descriptor.name, "no indexes declared");
        return Ok(());
    }

    let names = connection
        .backend()
        .create_indexes(descriptor.collection, descriptor.indexes.clone())
        .await?;

    info!(model = %descriptor.name, indexes = ?names, "indexes created");

    Ok(())
}
