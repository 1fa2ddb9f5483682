//! Report definitions.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use prism_core::record::Value;
use prism_core::{CacheState, CoreError, CoreResult, ReportId, SourceDescriptor};
use prism_render::{OutputFormat, VisualizationConfig};
use prism_transform::TransformStep;
use serde::{Deserialize, Serialize};

/// Query section shared by reports and widgets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Query text overriding each relational source's own `query`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Values for `${name}` placeholders
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
    /// Field filters
    #[serde(default)]
    pub filters: IndexMap<String, Value>,
    /// Transform steps, in execution order
    #[serde(default)]
    pub transformations: Vec<TransformStep>,
}

/// Periodic execution of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSchedule {
    /// Minutes between scheduled runs
    pub interval_minutes: u32,
    /// Whether the scheduler picks this report up
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// A declarative report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Report id
    #[serde(default)]
    pub id: ReportId,
    /// Display name
    pub name: String,
    /// Sources queried in declaration order
    #[serde(default)]
    pub data_sources: Vec<SourceDescriptor>,
    /// Query text, params, filters, transforms
    #[serde(default)]
    pub query_config: QueryConfig,
    /// Charts to build
    #[serde(default)]
    pub visualization_config: VisualizationConfig,
    /// Artifacts to render per execution
    #[serde(default)]
    pub output_formats: Vec<OutputFormat>,
    /// Cached result of the last successful run
    #[serde(default)]
    pub cache: CacheState,
    /// Optional periodic schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ReportSchedule>,
    /// Last time the scheduler triggered this report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scheduled_at: Option<DateTime<Utc>>,
}

impl ReportDefinition {
    /// Create a report with a fresh id and default settings
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ReportId::new(),
            name: name.into(),
            data_sources: Vec::new(),
            query_config: QueryConfig::default(),
            visualization_config: VisualizationConfig::default(),
            output_formats: Vec::new(),
            cache: CacheState::default(),
            schedule: None,
            last_scheduled_at: None,
        }
    }

    /// Add a data source
    #[must_use]
    pub fn with_source(mut self, source: SourceDescriptor) -> Self {
        self.data_sources.push(source);
        self
    }

    /// Replace the query config
    #[must_use]
    pub fn with_query_config(mut self, query_config: QueryConfig) -> Self {
        self.query_config = query_config;
        self
    }

    /// Add an output format
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_formats.push(format);
        self
    }

    /// Set the cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl_minutes: u32) -> Self {
        self.cache.ttl_minutes = ttl_minutes;
        self
    }

    /// Set the schedule
    #[must_use]
    pub fn with_schedule(mut self, interval_minutes: u32) -> Self {
        self.schedule = Some(ReportSchedule {
            interval_minutes,
            enabled: true,
        });
        self
    }

    /// Check the definition before it is stored or triggered
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        if self.data_sources.is_empty() {
            return Err(CoreError::validation(
                "data_sources",
                "at least one data source is required",
            ));
        }
        for source in &self.data_sources {
            source.validate(self.query_config.query.as_deref())?;
        }
        if let Some(schedule) = &self.schedule {
            if schedule.enabled && schedule.interval_minutes == 0 {
                return Err(CoreError::validation(
                    "schedule.interval_minutes",
                    "must be greater than zero",
                ));
            }
        }
        Ok(())
    }

    /// Whether the scheduler should trigger this report at `now`
    #[must_use]
    pub fn is_schedule_due(&self, now: DateTime<Utc>) -> bool {
        let Some(schedule) = self.schedule.filter(|s| s.enabled && s.interval_minutes > 0) else {
            return false;
        };
        match self.last_scheduled_at {
            Some(last) => now >= last + Duration::minutes(i64::from(schedule.interval_minutes)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sales_report() -> ReportDefinition {
        ReportDefinition::new("Sales").with_source(SourceDescriptor::dataset("sales", "sales"))
    }

    #[test]
    fn test_valid_report() {
        assert!(sales_report().validate().is_ok());
    }

    #[test]
    fn test_requires_data_source() {
        let err = ReportDefinition::new("Empty").validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "data_sources"));
    }

    #[test]
    fn test_relational_query_from_config() {
        let mut report = ReportDefinition::new("Orders").with_source(SourceDescriptor::new(
            "orders",
            prism_core::SourceKind::Relational,
        ));
        assert!(report.validate().is_err());

        report.query_config.query = Some("SELECT * FROM orders".to_string());
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_schedule_rejected() {
        let report = sales_report().with_schedule(0);
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_schedule_due() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut report = sales_report().with_schedule(30);
        assert!(report.is_schedule_due(t0));

        report.last_scheduled_at = Some(t0);
        assert!(!report.is_schedule_due(t0 + Duration::minutes(29)));
        assert!(report.is_schedule_due(t0 + Duration::minutes(30)));

        report.schedule = Some(ReportSchedule {
            interval_minutes: 30,
            enabled: false,
        });
        assert!(!report.is_schedule_due(t0 + Duration::days(1)));
    }

    #[test]
    fn test_deserialize_minimal() {
        let report: ReportDefinition = serde_json::from_value(json!({
            "name": "Revenue",
            "data_sources": [{"name": "rev", "type": "dataset", "config": {"dataset_id": "rev"}}],
            "query_config": {
                "transformations": [{"type": "limit", "n": 3}]
            },
            "output_formats": ["csv", "docx"],
            "cache": {"ttl_minutes": 15}
        }))
        .unwrap();

        assert_eq!(report.cache.ttl_minutes, 15);
        assert_eq!(report.query_config.transformations.len(), 1);
        assert_eq!(report.output_formats[1], OutputFormat::from("docx"));
        assert!(report.validate().is_ok());
    }
}
