//! HTTP connector for external API sources.

use async_trait::async_trait;
use prism_core::record::{Record, Value, records_from_json, to_plain_string};
use std::time::Duration;

use crate::connector::{ApiConnector, ApiRequest};
use crate::error::{QueryError, QueryResult};

/// [`ApiConnector`] over `reqwest`
///
/// `GET` requests carry params and filters as query-string pairs; `POST`
/// requests send them as a JSON body `{"params": …, "filters": …}`.
#[derive(Debug, Clone)]
pub struct HttpApiConnector {
    client: reqwest::Client,
}

impl HttpApiConnector {
    /// Create a connector with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> QueryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Connector(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Follow a dotted path (`data.items`) into a JSON document
fn select_path(document: Value, path: Option<&str>) -> Option<Value> {
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return Some(document);
    };

    let mut current = document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(current)
}

#[async_trait]
impl ApiConnector for HttpApiConnector {
    async fn fetch(&self, request: &ApiRequest) -> QueryResult<Vec<Record>> {
        let builder = match request.method.to_ascii_uppercase().as_str() {
            "POST" => self.client.post(&request.url).json(&serde_json::json!({
                "params": request.params,
                "filters": request.filters,
            })),
            "GET" => {
                let pairs: Vec<(String, String)> = request
                    .params
                    .iter()
                    .chain(request.filters.iter())
                    .map(|(k, v)| (k.clone(), to_plain_string(v)))
                    .collect();
                self.client.get(&request.url).query(&pairs)
            }
            other => {
                return Err(QueryError::InvalidResponse {
                    source_name: request.source_name.clone(),
                    reason: format!("unsupported HTTP method {}", other),
                });
            }
        };

        let builder = request
            .headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()));

        let response = builder
            .send()
            .await
            .map_err(|e| QueryError::Connector(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Connector(format!(
                "{} returned HTTP {}",
                request.url, status
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| QueryError::InvalidResponse {
                source_name: request.source_name.clone(),
                reason: e.to_string(),
            })?;

        let selected = select_path(document, request.records_path.as_deref()).ok_or_else(|| {
            QueryError::InvalidResponse {
                source_name: request.source_name.clone(),
                reason: format!(
                    "records path '{}' not present in response",
                    request.records_path.as_deref().unwrap_or_default()
                ),
            }
        })?;

        Ok(records_from_json(selected))
    }
}
