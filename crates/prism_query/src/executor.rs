//! Query executor: dispatches one query to the connector for its source kind.

use indexmap::IndexMap;
use prism_core::record::{Record, Value, values_equal};
use prism_core::{SourceDescriptor, SourceKind};
use std::sync::Arc;
use tracing::debug;

use crate::connector::{ApiConnector, ApiRequest, DatasetCatalog, MemoryDatasetCatalog, RelationalConnector};
use crate::error::{QueryError, QueryResult};
use crate::sql::build_relational_query;

/// Query-side inputs shared by every source of one report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryInput {
    /// Query text overriding the source's own `query`
    pub query: Option<String>,
    /// Values for `${name}` placeholders
    pub params: IndexMap<String, Value>,
    /// Field filters; list values mean membership
    pub filters: IndexMap<String, Value>,
}

impl QueryInput {
    /// Input with only a query override
    #[must_use]
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }
}

/// Executes queries against declared sources
///
/// Side-effect free with respect to reports and widgets; the only effects are
/// whatever the connectors do.
#[derive(Clone)]
pub struct QueryExecutor {
    relational: Option<Arc<dyn RelationalConnector>>,
    datasets: Arc<dyn DatasetCatalog>,
    api: Option<Arc<dyn ApiConnector>>,
}

impl QueryExecutor {
    /// Create an executor over a dataset catalog
    #[must_use]
    pub fn new(datasets: Arc<dyn DatasetCatalog>) -> Self {
        Self {
            relational: None,
            datasets,
            api: None,
        }
    }

    /// Register the relational connector
    #[must_use]
    pub fn with_relational(mut self, connector: Arc<dyn RelationalConnector>) -> Self {
        self.relational = Some(connector);
        self
    }

    /// Register the external API connector
    #[must_use]
    pub fn with_api(mut self, connector: Arc<dyn ApiConnector>) -> Self {
        self.api = Some(connector);
        self
    }

    /// Run one query against one source
    ///
    /// # Errors
    ///
    /// `UnsupportedSourceKind` for kinds outside the closed set, `NotFound`
    /// for unknown datasets, and connector errors otherwise
    pub async fn execute(
        &self,
        source: &SourceDescriptor,
        input: &QueryInput,
    ) -> QueryResult<Vec<Record>> {
        debug!(source = %source.name, kind = %source.kind, "executing source query");

        let rows = match &source.kind {
            SourceKind::Relational => self.execute_relational(source, input).await?,
            SourceKind::Dataset => self.execute_dataset(source, input).await?,
            SourceKind::ExternalApi => self.execute_api(source, input).await?,
            SourceKind::Unsupported(kind) => {
                return Err(QueryError::UnsupportedSourceKind { kind: kind.clone() });
            }
        };

        debug!(source = %source.name, rows = rows.len(), "source query finished");
        Ok(rows)
    }

    /// Run the query against every source and concatenate the rows
    ///
    /// Rows keep source-declaration order. The first failing source aborts
    /// the whole call.
    ///
    /// # Errors
    ///
    /// Returns the first source error
    pub async fn execute_all(
        &self,
        sources: &[SourceDescriptor],
        input: &QueryInput,
    ) -> QueryResult<Vec<Record>> {
        let mut combined = Vec::new();
        for source in sources {
            combined.extend(self.execute(source, input).await?);
        }
        Ok(combined)
    }

    async fn execute_relational(
        &self,
        source: &SourceDescriptor,
        input: &QueryInput,
    ) -> QueryResult<Vec<Record>> {
        let connector = self
            .relational
            .as_ref()
            .ok_or_else(|| QueryError::ConnectorUnavailable {
                kind: SourceKind::Relational.to_string(),
            })?;

        let text = input
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .or_else(|| source.config_str("query"))
            .ok_or_else(|| QueryError::MissingField {
                source_name: source.name.clone(),
                field: "query".to_string(),
            })?;

        let sql = build_relational_query(text, &input.params, &input.filters);
        let connection = source
            .config
            .get("connection")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        debug!(source = %source.name, %sql, "relational query prepared");
        connector.query(&connection, &sql).await
    }

    async fn execute_dataset(
        &self,
        source: &SourceDescriptor,
        input: &QueryInput,
    ) -> QueryResult<Vec<Record>> {
        let dataset_id = source
            .config_str("dataset_id")
            .ok_or_else(|| QueryError::MissingField {
                source_name: source.name.clone(),
                field: "dataset_id".to_string(),
            })?;

        let rows = self
            .datasets
            .rows(dataset_id)
            .await?
            .ok_or_else(|| QueryError::NotFound {
                kind: "dataset".to_string(),
                id: dataset_id.to_string(),
            })?;

        Ok(rows
            .into_iter()
            .filter(|row| matches_filters(row, &input.filters))
            .collect())
    }

    async fn execute_api(
        &self,
        source: &SourceDescriptor,
        input: &QueryInput,
    ) -> QueryResult<Vec<Record>> {
        let connector = self
            .api
            .as_ref()
            .ok_or_else(|| QueryError::ConnectorUnavailable {
                kind: SourceKind::ExternalApi.to_string(),
            })?;

        let url = source
            .config_str("url")
            .ok_or_else(|| QueryError::MissingField {
                source_name: source.name.clone(),
                field: "url".to_string(),
            })?;

        let headers = source
            .config
            .get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let request = ApiRequest {
            source_name: source.name.clone(),
            url: url.to_string(),
            method: source.config_str("method").unwrap_or("GET").to_string(),
            headers,
            params: input.params.clone(),
            filters: input.filters.clone(),
            records_path: source.config_str("records_path").map(str::to_string),
        };

        connector.fetch(&request).await
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(MemoryDatasetCatalog::new()))
    }
}

/// In-memory filter semantics matching the SQL predicates
fn matches_filters(row: &Record, filters: &IndexMap<String, Value>) -> bool {
    filters.iter().all(|(field, expected)| {
        let actual = row.get(field).unwrap_or(&Value::Null);
        match expected {
            Value::Array(options) => options.iter().any(|option| values_equal(actual, option)),
            other => values_equal(actual, other),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prism_core::record::records_from_json;
    use serde_json::{Map, json};
    use std::sync::Mutex;

    struct RecordingConnector {
        seen: Mutex<Vec<String>>,
        rows: Vec<Record>,
    }

    #[async_trait]
    impl RelationalConnector for RecordingConnector {
        async fn query(&self, _connection: &Map<String, Value>, sql: &str) -> QueryResult<Vec<Record>> {
            self.seen.lock().unwrap().push(sql.to_string());
            Ok(self.rows.clone())
        }
    }

    async fn catalog_with(id: &str, rows: Value) -> Arc<MemoryDatasetCatalog> {
        let catalog = Arc::new(MemoryDatasetCatalog::new());
        catalog.insert(id, records_from_json(rows)).await;
        catalog
    }

    #[tokio::test]
    async fn test_unsupported_kind_fails() {
        let executor = QueryExecutor::default();
        let source = SourceDescriptor::new("x", SourceKind::Unsupported("ftp".to_string()));

        let result = executor.execute(&source, &QueryInput::default()).await;
        assert_eq!(
            result,
            Err(QueryError::UnsupportedSourceKind {
                kind: "ftp".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_dataset_not_found() {
        let executor = QueryExecutor::default();
        let source = SourceDescriptor::dataset("sales", "missing");

        let result = executor.execute(&source, &QueryInput::default()).await;
        assert!(matches!(result, Err(QueryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_dataset_rows_and_filters() {
        let catalog = catalog_with(
            "sales",
            json!([
                {"region": "east", "amount": 10},
                {"region": "west", "amount": 5},
                {"region": "north", "amount": 1}
            ]),
        )
        .await;
        let executor = QueryExecutor::new(catalog);
        let source = SourceDescriptor::dataset("sales", "sales");

        let all = executor.execute(&source, &QueryInput::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let mut input = QueryInput::default();
        input.filters.insert("region".to_string(), json!(["east", "north"]));
        let filtered = executor.execute(&source, &input).await.unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[1]["region"], json!("north"));
    }

    #[tokio::test]
    async fn test_relational_builds_sql() {
        let connector = Arc::new(RecordingConnector {
            seen: Mutex::new(Vec::new()),
            rows: records_from_json(json!([{"n": 1}])),
        });
        let executor = QueryExecutor::default().with_relational(connector.clone());
        let source = SourceDescriptor::relational("orders", "SELECT * FROM orders WHERE y = ${year}");

        let mut input = QueryInput::default();
        input.params.insert("year".to_string(), json!(2024));
        input.filters.insert("status".to_string(), json!("paid"));

        let rows = executor.execute(&source, &input).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            connector.seen.lock().unwrap()[0],
            "SELECT * FROM orders WHERE (y = 2024) AND status = 'paid'"
        );
    }

    #[tokio::test]
    async fn test_relational_query_override() {
        let connector = Arc::new(RecordingConnector {
            seen: Mutex::new(Vec::new()),
            rows: Vec::new(),
        });
        let executor = QueryExecutor::default().with_relational(connector.clone());
        let source = SourceDescriptor::relational("orders", "SELECT 1");

        executor
            .execute(&source, &QueryInput::with_query("SELECT 2"))
            .await
            .unwrap();
        assert_eq!(connector.seen.lock().unwrap()[0], "SELECT 2");
    }

    #[tokio::test]
    async fn test_relational_without_connector() {
        let executor = QueryExecutor::default();
        let source = SourceDescriptor::relational("orders", "SELECT 1");

        let result = executor.execute(&source, &QueryInput::default()).await;
        assert!(matches!(result, Err(QueryError::ConnectorUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_execute_all_concatenates_in_order() {
        let catalog = Arc::new(MemoryDatasetCatalog::new());
        catalog.insert("a", records_from_json(json!([{"src": "a", "i": 1}, {"src": "a", "i": 2}]))).await;
        catalog.insert("b", records_from_json(json!([{"src": "b", "i": 3}]))).await;
        let executor = QueryExecutor::new(catalog);

        let sources = vec![
            SourceDescriptor::dataset("second", "b"),
            SourceDescriptor::dataset("first", "a"),
        ];
        let rows = executor.execute_all(&sources, &QueryInput::default()).await.unwrap();

        let order: Vec<i64> = rows.iter().map(|r| r["i"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_execute_all_aborts_on_failure() {
        let catalog = catalog_with("a", json!([{"i": 1}])).await;
        let executor = QueryExecutor::new(catalog);

        let sources = vec![
            SourceDescriptor::dataset("ok", "a"),
            SourceDescriptor::dataset("broken", "missing"),
        ];
        let result = executor.execute_all(&sources, &QueryInput::default()).await;
        assert!(matches!(result, Err(QueryError::NotFound { .. })));
    }
}
