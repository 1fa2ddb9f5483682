//! Row records flowing through the query, transform, and render stages.
//!
//! A [`Record`] is an ordered map of field name to scalar JSON value. Field
//! order is the order the connector produced it and is preserved end to end
//! so tabular output keeps a stable column order.

use indexmap::IndexMap;
use std::cmp::Ordering;

pub use serde_json::Value;

/// One row: ordered field name to scalar value
pub type Record = IndexMap<String, Value>;

/// Numeric view of a value (numbers only)
#[must_use]
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Lenient numeric view: numbers and numeric strings
#[must_use]
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Render a value the way it reads in text: strings unquoted, null empty
#[must_use]
pub fn to_plain_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over values: nulls first, numbers numerically, strings
/// lexically, mixed types by type rank
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality with numeric coercion (`1 == 1.0`)
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Convert a JSON document into rows
///
/// Arrays yield one row per element, objects yield a single row, scalars are
/// wrapped as `{"value": …}`. `null` yields no rows.
#[must_use]
pub fn records_from_json(value: Value) -> Vec<Record> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(record_from_json).collect(),
        other => record_from_json(other).into_iter().collect(),
    }
}

fn record_from_json(value: Value) -> Option<Record> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(map.into_iter().collect()),
        scalar => {
            let mut record = Record::new();
            record.insert("value".to_string(), scalar);
            Some(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_numbers_numerically() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!(3), &json!(3.0)), Ordering::Equal);
    }

    #[test]
    fn test_compare_nulls_first() {
        assert_eq!(compare_values(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!("a"), &Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_compare_strings() {
        assert_eq!(compare_values(&json!("apple"), &json!("banana")), Ordering::Less);
    }

    #[test]
    fn test_values_equal_coerces_numbers() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
        assert!(values_equal(&json!("x"), &json!("x")));
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(to_plain_string(&json!("east")), "east");
        assert_eq!(to_plain_string(&json!(42)), "42");
        assert_eq!(to_plain_string(&json!(true)), "true");
        assert_eq!(to_plain_string(&Value::Null), "");
    }

    #[test]
    fn test_coerce_f64() {
        assert_eq!(coerce_f64(&json!("12.5")), Some(12.5));
        assert_eq!(coerce_f64(&json!(3)), Some(3.0));
        assert_eq!(coerce_f64(&json!("n/a")), None);
        assert_eq!(as_f64(&json!("12.5")), None);
    }

    #[test]
    fn test_records_from_json_preserves_field_order() {
        let rows = records_from_json(json!([{"b": 1, "a": 2}, {"b": 3, "a": 4}]));
        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_records_from_json_scalars() {
        let rows = records_from_json(json!([1, null, 2]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["value"], json!(1));

        assert!(records_from_json(Value::Null).is_empty());
        assert_eq!(records_from_json(json!({"total": 9})).len(), 1);
    }
}
