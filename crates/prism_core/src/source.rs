//! Data-source descriptors.
//!
//! Source kinds form a closed set. Any tag outside it parses into
//! [`SourceKind::Unsupported`] so dispatch stays exhaustive and the query
//! executor can reject it explicitly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Kind of data source a report or rule reads from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// SQL text run through a relational connector
    Relational,
    /// Reference to a stored dataset by id
    Dataset,
    /// HTTP endpoint returning JSON rows
    ExternalApi,
    /// Anything else, kept verbatim for error reporting
    Unsupported(String),
}

impl SourceKind {
    /// Canonical tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Relational => "relational",
            Self::Dataset => "dataset",
            Self::ExternalApi => "external_api",
            Self::Unsupported(name) => name,
        }
    }
}

impl From<String> for SourceKind {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "relational" | "database" | "sql" => Self::Relational,
            "dataset" | "data_set" => Self::Dataset,
            "external_api" | "api" => Self::ExternalApi,
            _ => Self::Unsupported(tag),
        }
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Human-readable name, used in logs and errors
    pub name: String,
    /// Source kind tag
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Kind-specific settings (`query`, `connection`, `dataset_id`, `url`, ...)
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl SourceDescriptor {
    /// Create a descriptor with empty config
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            config: Map::new(),
        }
    }

    /// Relational source with inline query text
    #[must_use]
    pub fn relational(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(name, SourceKind::Relational).with_config("query", Value::String(query.into()))
    }

    /// Dataset reference source
    #[must_use]
    pub fn dataset(name: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self::new(name, SourceKind::Dataset)
            .with_config("dataset_id", Value::String(dataset_id.into()))
    }

    /// External API source
    #[must_use]
    pub fn external_api(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, SourceKind::ExternalApi).with_config("url", Value::String(url.into()))
    }

    /// Set a config entry
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// String config entry, if present and non-empty
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Check the fields this kind needs
    ///
    /// `query_override` is the query text supplied by the owning report or
    /// rule, which satisfies the relational `query` requirement.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing field
    pub fn validate(&self, query_override: Option<&str>) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("data_source.name", "must not be empty"));
        }

        let required = match self.kind {
            SourceKind::Relational => {
                let has_override = query_override.is_some_and(|q| !q.trim().is_empty());
                if has_override { None } else { Some("query") }
            }
            SourceKind::Dataset => Some("dataset_id"),
            SourceKind::ExternalApi => Some("url"),
            // Rejected at execution time with UnsupportedSourceKind
            SourceKind::Unsupported(_) => None,
        };

        match required {
            Some(field) if self.config_str(field).is_none() => Err(CoreError::validation(
                format!("data_source.{}.{}", self.name, field),
                format!("required for {} sources", self.kind),
            )),
            _ => Ok(()),
        }
    }
}
