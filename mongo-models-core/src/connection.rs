//! Connection lifecycle.
//!
//! A [`Connection`] owns one driver adapter and hands out model collections bound to it.
//! Connections are explicit values: each test, tenant or database gets its own, and they
//! can be used side by side.
//!
//! Hosts that want a single shared handle (a plugin registering models once at startup)
//! keep it in a [`ConnectionSlot`], which replaces the handle on reconnect and reports
//! [`ModelError::NotConnected`] when empty.
//!
//! # Example
//!
//! ```ignore
//! use mongo_models::{connection::Connection, mongodb::MongoDbBackend};
//!
//! let connection = Connection::connect(
//!     MongoDbBackend::builder("mongodb://localhost:27017", "app"),
//! ).await?;
//!
//! let users = connection.model::<User>();
//! // ...
//! connection.disconnect().await?;
//! ```

use mea::rwlock::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    backend::{Backend, BackendBuilder},
    collection::ModelCollection,
    error::{ModelError, ModelResult},
    model::Model,
};

/// A handle to an open driver adapter.
///
/// Cloning is cheap; clones share the same adapter.
#[derive(Debug, Clone)]
pub struct Connection {
    backend: Arc<dyn Backend>,
}

impl Connection {
    /// Wraps an already opened adapter.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wraps a shared adapter.
    pub fn from_shared(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Opens an adapter with `builder`.
    ///
    /// # Errors
    ///
    /// Returns whatever the builder reports, typically
    /// [`ModelError::Initialization`] when the server cannot be reached.
    pub async fn connect<B>(builder: B) -> ModelResult<Self>
    where
        B: BackendBuilder,
        B::Backend: 'static,
    {
        let backend = builder.build().await?;

        info!(backend = ?backend, "connected");

        Ok(Self::new(backend))
    }

    /// Returns the collection operations of the model `M`.
    pub fn model<M: Model>(&self) -> ModelCollection<'_, M> {
        ModelCollection::new(self.backend.as_ref())
    }

    /// Returns the underlying adapter.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Closes the adapter. Clones of this connection are closed as well.
    pub async fn disconnect(&self) -> ModelResult<()> {
        self.backend.close().await?;

        info!("disconnected");

        Ok(())
    }
}

/// Holder for one shared, replaceable connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSlot {
    current: Arc<RwLock<Option<Connection>>>,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection and stores it, closing any previous one.
    ///
    /// On failure the slot is left as it was.
    pub async fn connect<B>(&self, builder: B) -> ModelResult<Connection>
    where
        B: BackendBuilder,
        B::Backend: 'static,
    {
        let connection = Connection::connect(builder).await?;
        self.replace(connection.clone()).await;

        Ok(connection)
    }

    /// Stores `connection`, closing any previous one.
    pub async fn replace(&self, connection: Connection) {
        let previous = self.current.write().await.replace(connection);

        if let Some(previous) = previous {
            if let Err(err) = previous.disconnect().await {
                warn!(error = %err, "failed to close replaced connection");
            }
        }
    }

    /// Returns the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotConnected`] when no connection is stored.
    pub async fn get(&self) -> ModelResult<Connection> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(ModelError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Removes and closes the current connection. Does nothing when empty.
    pub async fn disconnect(&self) -> ModelResult<()> {
        let current = self.current.write().await.take();

        match current {
            Some(connection) => connection.disconnect().await,
            None => Ok(()),
        }
    }
}
