//! Transform step definitions.

use indexmap::IndexMap;
use prism_core::record::{Value, as_f64, compare_values, values_equal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Aggregate function applied per output field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    /// Sum of numeric values
    Sum,
    /// Arithmetic mean of numeric values
    #[serde(alias = "mean", alias = "average")]
    Avg,
    /// Number of non-null values
    Count,
    /// Smallest non-null value
    Min,
    /// Largest non-null value
    Max,
}

/// Comparison used by a filter step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Field equals the value
    #[serde(alias = "eq")]
    Equals,
    /// Field is strictly greater than the value
    #[serde(alias = "gt")]
    GreaterThan,
    /// Field is strictly less than the value
    #[serde(alias = "lt")]
    LessThan,
}

impl FilterOperator {
    /// Whether `actual <op> expected` holds
    ///
    /// Ordering comparisons only hold between values of comparable types
    /// (two numbers or two strings); anything else is retained as false.
    #[must_use]
    pub fn matches(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Equals => values_equal(actual, expected),
            Self::GreaterThan => ordered(actual, expected) == Some(Ordering::Greater),
            Self::LessThan => ordered(actual, expected) == Some(Ordering::Less),
        }
    }
}

fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        (Value::String(_), Value::String(_)) => Some(compare_values(a, b)),
        _ => None,
    }
}

fn default_ascending() -> bool {
    true
}

/// One pipeline step, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    /// Group rows by key tuple and aggregate the named fields
    #[serde(alias = "aggregate", alias = "group_by")]
    Aggregation {
        /// Group-by fields, in key-tuple order
        #[serde(default)]
        group_by: Vec<String>,
        /// Output field to aggregate function
        #[serde(default)]
        aggregations: IndexMap<String, AggregateFn>,
    },
    /// Keep rows matching a comparison
    Filter {
        /// Field to compare
        field: String,
        /// Comparison operator
        operator: FilterOperator,
        /// Right-hand value
        value: Value,
    },
    /// Stable sort on one field
    Sort {
        /// Sort key
        field: String,
        /// Ascending (default) or descending
        #[serde(default = "default_ascending")]
        ascending: bool,
    },
    /// Keep the first `n` rows
    Limit {
        /// Row count
        #[serde(alias = "count", alias = "limit")]
        n: usize,
    },
    /// Any other step type; applied as a no-op
    #[serde(other)]
    Unknown,
}

impl TransformStep {
    /// Step type tag, for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Aggregation { .. } => "aggregation",
            Self::Filter { .. } => "filter",
            Self::Sort { .. } => "sort",
            Self::Limit { .. } => "limit",
            Self::Unknown => "unknown",
        }
    }
}
