//! Visualization builder: rows plus chart specs to chart payloads.

use indexmap::IndexMap;
use prism_core::record::{Record, Value};
use tracing::debug;

use crate::chart::{ChartConfig, ChartPayload, ChartSpec, ChartType};

/// Builds chart payloads from transformed rows
///
/// Field names not set in a spec's options default to the first column
/// (labels, x-axis) and second column (values, y-axis) of the data.
#[derive(Debug, Clone, Default)]
pub struct VisualizationBuilder {
    max_points: Option<usize>,
}

impl VisualizationBuilder {
    /// Create a builder that keeps every row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the rows embedded in each payload
    #[must_use]
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = Some(max_points);
        self
    }

    /// Build every chart, keyed by chart name
    ///
    /// A later spec with a duplicate name replaces the earlier payload.
    #[must_use]
    pub fn build(&self, rows: &[Record], specs: &[ChartSpec]) -> IndexMap<String, ChartPayload> {
        specs
            .iter()
            .map(|spec| (spec.name.clone(), self.build_one(rows, spec)))
            .collect()
    }

    /// Build one chart
    #[must_use]
    pub fn build_one(&self, rows: &[Record], spec: &ChartSpec) -> ChartPayload {
        let columns = columns_of(rows);
        let first = columns.first().cloned();
        let second = columns.get(1).cloned().or_else(|| first.clone());
        let pick = |keys: &[&str], fallback: &Option<String>| {
            spec.option_str(keys)
                .map(str::to_string)
                .or_else(|| fallback.clone())
        };

        let config = match &spec.chart_type {
            ChartType::Bar | ChartType::Line | ChartType::Scatter => ChartConfig::Axis {
                x_field: pick(&["x_field", "x_axis"], &first),
                y_field: pick(&["y_field", "y_axis"], &second),
                series_field: spec.option_str(&["series_field", "series"]).map(str::to_string),
            },
            ChartType::Pie => ChartConfig::Pie {
                label_field: pick(&["label_field", "label"], &first),
                value_field: pick(&["value_field", "value"], &second),
            },
            ChartType::Table => ChartConfig::Table {
                columns: spec
                    .options
                    .get("columns")
                    .and_then(Value::as_array)
                    .map(|cols| {
                        cols.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_else(|| columns.clone()),
            },
            ChartType::Metric => {
                let value_field = pick(&["value_field", "value"], &first);
                ChartConfig::Metric {
                    value: first_value(rows, value_field.as_deref()),
                    value_field,
                    format: spec.option_str(&["format"]).map(str::to_string),
                }
            }
            ChartType::Gauge => {
                let value_field = pick(&["value_field", "value"], &first);
                ChartConfig::Gauge {
                    value: first_value(rows, value_field.as_deref()),
                    value_field,
                    min: spec.option_f64("min").unwrap_or(0.0),
                    max: spec.option_f64("max").unwrap_or(100.0),
                }
            }
            ChartType::Heatmap => {
                let third = columns.get(2).cloned().or_else(|| second.clone());
                ChartConfig::Heatmap {
                    x_field: pick(&["x_field", "x_axis"], &first),
                    y_field: pick(&["y_field", "y_axis"], &second),
                    value_field: pick(&["value_field", "value"], &third),
                }
            }
            ChartType::Unknown(name) => {
                debug!(chart = %spec.name, chart_type = %name, "unknown chart type, passing rows through");
                ChartConfig::Raw {
                    options: spec.options.clone(),
                }
            }
        };

        let data = match self.max_points {
            Some(max) => rows.iter().take(max).cloned().collect(),
            None => rows.to_vec(),
        };

        ChartPayload {
            chart_type: spec.chart_type.clone(),
            title: spec.display_title().to_string(),
            data,
            config,
        }
    }
}

/// Column names in first-seen order across all rows
#[must_use]
pub(crate) fn columns_of(rows: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn first_value(rows: &[Record], field: Option<&str>) -> Value {
    field
        .and_then(|field| rows.first()?.get(field).cloned())
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::record::records_from_json;
    use serde_json::json;

    fn sales() -> Vec<Record> {
        records_from_json(json!([
            {"region": "east", "amount": 25},
            {"region": "west", "amount": 40}
        ]))
    }

    #[test]
    fn test_bar_defaults_to_first_columns() {
        let payload = VisualizationBuilder::new().build_one(&sales(), &ChartSpec::new("c", ChartType::Bar));
        assert_eq!(
            payload.config,
            ChartConfig::Axis {
                x_field: Some("region".to_string()),
                y_field: Some("amount".to_string()),
                series_field: None,
            }
        );
        assert_eq!(payload.data.len(), 2);
        assert_eq!(payload.title, "c");
    }

    #[test]
    fn test_pie_uses_options() {
        let spec = ChartSpec::new("share", ChartType::Pie)
            .with_title("Share")
            .with_option("label_field", "region")
            .with_option("value_field", "amount");
        let payload = VisualizationBuilder::new().build_one(&sales(), &spec);
        assert_eq!(payload.title, "Share");
        assert_eq!(
            payload.config,
            ChartConfig::Pie {
                label_field: Some("region".to_string()),
                value_field: Some("amount".to_string()),
            }
        );
    }

    #[test]
    fn test_metric_reads_first_row() {
        let spec = ChartSpec::new("total", ChartType::Metric).with_option("value_field", "amount");
        let payload = VisualizationBuilder::new().build_one(&sales(), &spec);
        assert!(matches!(
            payload.config,
            ChartConfig::Metric { ref value, .. } if *value == json!(25)
        ));
    }

    #[test]
    fn test_gauge_bounds() {
        let spec = ChartSpec::new("g", ChartType::Gauge).with_option("max", 50);
        let payload = VisualizationBuilder::new().build_one(&sales(), &spec);
        match payload.config {
            ChartConfig::Gauge { min, max, .. } => {
                assert_eq!(min, 0.0);
                assert_eq!(max, 50.0);
            }
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_degrades_to_raw() {
        let spec = ChartSpec::new("flow", ChartType::Unknown("sankey".to_string())).with_option("links", "x");
        let payload = VisualizationBuilder::new().build_one(&sales(), &spec);
        assert_eq!(payload.chart_type, ChartType::Unknown("sankey".to_string()));
        assert_eq!(payload.data, sales());
        assert!(matches!(payload.config, ChartConfig::Raw { .. }));
    }

    #[test]
    fn test_build_keys_by_name() {
        let specs = vec![
            ChartSpec::new("b", ChartType::Table),
            ChartSpec::new("a", ChartType::Line),
        ];
        let charts = VisualizationBuilder::new().build(&sales(), &specs);
        let names: Vec<&str> = charts.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(
            charts["b"].config,
            ChartConfig::Table {
                columns: vec!["region".to_string(), "amount".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_rows() {
        let payload = VisualizationBuilder::new().build_one(&[], &ChartSpec::new("m", ChartType::Metric));
        assert_eq!(
            payload.config,
            ChartConfig::Metric {
                value_field: None,
                value: Value::Null,
                format: None,
            }
        );
    }

    #[test]
    fn test_max_points() {
        let payload = VisualizationBuilder::new()
            .with_max_points(1)
            .build_one(&sales(), &ChartSpec::new("c", ChartType::Bar));
        assert_eq!(payload.data.len(), 1);
    }
}
