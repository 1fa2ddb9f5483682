//! Connector traits for the pluggable data-source drivers.
//!
//! The query executor only decides *which* connector to call. Real drivers
//! (databases, object stores, HTTP APIs) implement these traits.

use async_trait::async_trait;
use indexmap::IndexMap;
use prism_core::record::{Record, Value, records_from_json};
use serde_json::Map;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::error::{QueryError, QueryResult};

/// Driver for relational sources
#[async_trait]
pub trait RelationalConnector: Send + Sync {
    /// Run fully prepared SQL against the given connection settings
    async fn query(&self, connection: &Map<String, Value>, sql: &str) -> QueryResult<Vec<Record>>;
}

/// Lookup of stored datasets
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Rows of a dataset, or `None` if no dataset has this id
    async fn rows(&self, dataset_id: &str) -> QueryResult<Option<Vec<Record>>>;
}

/// Request handed to an [`ApiConnector`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Source name, for error context
    pub source_name: String,
    /// Endpoint URL
    pub url: String,
    /// HTTP method (`GET` or `POST`)
    pub method: String,
    /// Extra request headers
    pub headers: IndexMap<String, String>,
    /// Report parameters
    pub params: IndexMap<String, Value>,
    /// Report filters
    pub filters: IndexMap<String, Value>,
    /// Dotted path to the row array inside the response body
    pub records_path: Option<String>,
}

/// Driver for external API sources
#[async_trait]
pub trait ApiConnector: Send + Sync {
    /// Fetch rows from the endpoint
    async fn fetch(&self, request: &ApiRequest) -> QueryResult<Vec<Record>>;
}

/// In-memory dataset catalog
#[derive(Debug, Default)]
pub struct MemoryDatasetCatalog {
    datasets: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryDatasetCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a dataset
    pub async fn insert(&self, dataset_id: impl Into<String>, rows: Vec<Record>) {
        self.datasets.write().await.insert(dataset_id.into(), rows);
    }

    /// Remove a dataset
    pub async fn remove(&self, dataset_id: &str) -> bool {
        self.datasets.write().await.remove(dataset_id).is_some()
    }

    /// Number of datasets
    pub async fn len(&self) -> usize {
        self.datasets.read().await.len()
    }

    /// Whether the catalog holds no datasets
    pub async fn is_empty(&self) -> bool {
        self.datasets.read().await.is_empty()
    }
}

#[async_trait]
impl DatasetCatalog for MemoryDatasetCatalog {
    async fn rows(&self, dataset_id: &str) -> QueryResult<Option<Vec<Record>>> {
        Ok(self.datasets.read().await.get(dataset_id).cloned())
    }
}

/// Dataset catalog backed by a directory of JSON files
///
/// Dataset `sales` lives at `<dir>/sales.json` and holds a JSON array of
/// objects.
#[derive(Debug, Clone)]
pub struct FsDatasetCatalog {
    dir: PathBuf,
}

impl FsDatasetCatalog {
    /// Create a catalog rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn dataset_path(&self, dataset_id: &str) -> Option<PathBuf> {
        // Ids are file stems, never paths
        let valid = !dataset_id.is_empty()
            && dataset_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| self.dir.join(format!("{}.json", dataset_id)))
    }
}

#[async_trait]
impl DatasetCatalog for FsDatasetCatalog {
    async fn rows(&self, dataset_id: &str) -> QueryResult<Option<Vec<Record>>> {
        let Some(path) = self.dataset_path(dataset_id) else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(QueryError::Connector(format!(
                    "failed to read dataset {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let document: Value =
            serde_json::from_slice(&bytes).map_err(|e| QueryError::InvalidResponse {
                source_name: dataset_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(records_from_json(document)))
    }
}
