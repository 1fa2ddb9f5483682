//! Chart specifications and payloads.
//!
//! Chart types form a closed set. Unknown tags parse into
//! [`ChartType::Unknown`] and still produce a payload carrying the raw rows.

use prism_core::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of chart
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChartType {
    /// Bar chart
    Bar,
    /// Line chart
    Line,
    /// Pie chart
    Pie,
    /// Plain table
    Table,
    /// Single headline number
    Metric,
    /// Value on a min/max dial
    Gauge,
    /// Two-dimensional intensity grid
    Heatmap,
    /// Point cloud
    Scatter,
    /// Any other tag, kept verbatim
    Unknown(String),
}

impl ChartType {
    /// Canonical tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Table => "table",
            Self::Metric => "metric",
            Self::Gauge => "gauge",
            Self::Heatmap => "heatmap",
            Self::Scatter => "scatter",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for ChartType {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "bar" => Self::Bar,
            "line" => Self::Line,
            "pie" | "donut" => Self::Pie,
            "table" => Self::Table,
            "metric" | "kpi" => Self::Metric,
            "gauge" => Self::Gauge,
            "heatmap" => Self::Heatmap,
            "scatter" => Self::Scatter,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<ChartType> for String {
    fn from(chart_type: ChartType) -> Self {
        chart_type.as_str().to_string()
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared chart inside a report or widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Key of the payload in the output map
    pub name: String,
    /// Chart type tag
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    /// Display title; falls back to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Field names and type-specific settings (`x_field`, `value_field`, `min`, ...)
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl ChartSpec {
    /// Create a spec with no options
    #[must_use]
    pub fn new(name: impl Into<String>, chart_type: ChartType) -> Self {
        Self {
            name: name.into(),
            chart_type,
            title: None,
            options: Map::new(),
        }
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set one option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// First non-empty string option among `keys`
    #[must_use]
    pub fn option_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.options.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    /// Numeric option
    #[must_use]
    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.options.get(key).and_then(Value::as_f64)
    }

    /// Title to display
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Visualization section of a report definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Charts to build, in output order
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

/// Type-specific chart configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ChartConfig {
    /// Bar, line, and scatter charts
    Axis {
        /// Category or x-axis field
        x_field: Option<String>,
        /// Value or y-axis field
        y_field: Option<String>,
        /// Optional series split field
        #[serde(default, skip_serializing_if = "Option::is_none")]
        series_field: Option<String>,
    },
    /// Pie charts
    Pie {
        /// Slice label field
        label_field: Option<String>,
        /// Slice size field
        value_field: Option<String>,
    },
    /// Tables
    Table {
        /// Columns in display order
        columns: Vec<String>,
    },
    /// Single-number display
    Metric {
        /// Field holding the number
        value_field: Option<String>,
        /// Value read from the first row
        value: Value,
        /// Display format hint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    /// Gauges
    Gauge {
        /// Field holding the number
        value_field: Option<String>,
        /// Value read from the first row
        value: Value,
        /// Dial minimum
        min: f64,
        /// Dial maximum
        max: f64,
    },
    /// Heatmaps
    Heatmap {
        /// Column field
        x_field: Option<String>,
        /// Row field
        y_field: Option<String>,
        /// Cell intensity field
        value_field: Option<String>,
    },
    /// Unknown chart types carry their options untouched
    Raw {
        /// Options as declared
        options: Map<String, Value>,
    },
}

/// A built chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    /// Chart type tag
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    /// Display title
    pub title: String,
    /// Rows backing the chart
    pub data: Vec<Record>,
    /// Type-specific configuration
    pub config: ChartConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chart_type_parse() {
        assert_eq!(ChartType::from("Bar".to_string()), ChartType::Bar);
        assert_eq!(ChartType::from("donut".to_string()), ChartType::Pie);
        assert_eq!(
            ChartType::from("sankey".to_string()),
            ChartType::Unknown("sankey".to_string())
        );
        assert_eq!(ChartType::Unknown("sankey".to_string()).to_string(), "sankey");
    }

    #[test]
    fn test_chart_spec_deserialize() {
        let spec: ChartSpec = serde_json::from_value(json!({
            "name": "revenue",
            "type": "line",
            "options": {"x_field": "month", "y_field": "total"}
        }))
        .unwrap();

        assert_eq!(spec.chart_type, ChartType::Line);
        assert_eq!(spec.display_title(), "revenue");
        assert_eq!(spec.option_str(&["x_axis", "x_field"]), Some("month"));
        assert_eq!(spec.option_str(&["series_field"]), None);
    }

    #[test]
    fn test_payload_serializes_type_tag() {
        let payload = ChartPayload {
            chart_type: ChartType::Table,
            title: "t".to_string(),
            data: Vec::new(),
            config: ChartConfig::Table {
                columns: vec!["a".to_string()],
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], json!("table"));
        assert_eq!(value["config"]["layout"], json!("table"));
    }
}
