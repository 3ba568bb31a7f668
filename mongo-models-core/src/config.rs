//! Configuration for a model registry.
//!
//! ```json
//! {
//!   "mongodb": {
//!     "uri": "mongodb://localhost:27017",
//!     "database": "app",
//!     "options": { "maxPoolSize": 10, "connectTimeoutMs": 2000 }
//!   },
//!   "autoIndex": true
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    pub mongodb: MongoConfig,
    /// Create each registered model's indexes on start.
    #[serde(default = "default_auto_index")]
    pub auto_index: bool,
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    #[serde(default)]
    pub options: ClientConfig,
}

/// Client settings applied on top of the connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub app_name: Option<String>,
    pub min_pool_size: Option<u32>,
    pub max_pool_size: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_ms.map(Duration::from_millis)
    }
}

fn default_auto_index() -> bool {
    true
}

impl ModelsConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            mongodb: MongoConfig {
                uri: uri.into(),
                database: database.into(),
                options: ClientConfig::default(),
            },
            auto_index: true,
        }
    }

    pub fn with_auto_index(mut self, auto_index: bool) -> Self {
        self.auto_index = auto_index;
        self
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] when the document is malformed or incomplete.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::Config(e.to_string()))
    }
}
