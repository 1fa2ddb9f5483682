//! Threshold comparison and metric extraction.

use prism_core::record::{Record, Value, coerce_f64};
use prism_storage::ComparisonOperator;

/// Whether `value <op> threshold` holds
#[must_use]
#[allow(clippy::float_cmp)]
pub fn compare(value: f64, threshold: f64, op: ComparisonOperator) -> bool {
    match op {
        ComparisonOperator::GreaterThan => value > threshold,
        ComparisonOperator::LessThan => value < threshold,
        ComparisonOperator::GreaterOrEqual => value >= threshold,
        ComparisonOperator::LessOrEqual => value <= threshold,
        ComparisonOperator::Equal => value == threshold,
        ComparisonOperator::NotEqual => value != threshold,
    }
}

/// Metric value of a query result
///
/// Reads `metric_field` of the first row when given, else the first numeric
/// value of the first row. Numeric strings count; anything else is no value.
#[must_use]
pub fn metric_value(rows: &[Record], metric_field: Option<&str>) -> Option<f64> {
    let first = rows.first()?;
    match metric_field {
        Some(field) => first.get(field).and_then(numeric),
        None => first.values().find_map(numeric),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    coerce_f64(value).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::record::records_from_json;
    use serde_json::json;

    #[test]
    fn test_compare_table() {
        let cases = [
            (10.0, 5.0, ">", true),
            (5.0, 5.0, ">", false),
            (5.0, 5.0, ">=", true),
            (4.0, 5.0, "<", true),
            (5.0, 5.0, "<", false),
            (5.0, 5.0, "<=", true),
            (5.0, 5.0, "==", true),
            (5.0, 6.0, "==", false),
            (5.0, 6.0, "!=", true),
            (5.0, 5.0, "!=", false),
        ];
        for (value, threshold, symbol, expected) in cases {
            assert_eq!(
                compare(value, threshold, symbol.parse().unwrap()),
                expected,
                "{} {} {}",
                value,
                symbol,
                threshold
            );
        }
    }

    #[test]
    fn test_unknown_symbol() {
        assert!("=~".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn test_metric_field() {
        let rows = records_from_json(json!([
            {"host": "a", "cpu": 91.5, "mem": 40},
            {"host": "b", "cpu": 12.0, "mem": 30}
        ]));
        assert_eq!(metric_value(&rows, Some("cpu")), Some(91.5));
        assert_eq!(metric_value(&rows, Some("mem")), Some(40.0));
        assert_eq!(metric_value(&rows, Some("disk")), None);
        assert_eq!(metric_value(&rows, Some("host")), None);
    }

    #[test]
    fn test_first_numeric_value() {
        let rows = records_from_json(json!([{"host": "a", "load": "3.5", "cpu": 80}]));
        assert_eq!(metric_value(&rows, None), Some(3.5));

        let rows = records_from_json(json!([{"host": "a", "up": true}]));
        assert_eq!(metric_value(&rows, None), None);
        assert_eq!(metric_value(&[], None), None);
    }
}
