//! Group-by aggregation.
//!
//! Rows are partitioned by their group-by key tuple. One row is emitted per
//! distinct key, in first-seen order, holding the key fields followed by the
//! aggregated fields.

use indexmap::IndexMap;
use prism_core::record::{Record, Value, compare_values};
use serde_json::Number;
use std::cmp::Ordering;

use crate::step::AggregateFn;

/// Running state for one aggregated field within one group
#[derive(Debug, Default)]
struct Accumulator {
    int_sum: i64,
    float_sum: f64,
    all_integers: bool,
    numeric: usize,
    non_null: usize,
    min: Option<Value>,
    max: Option<Value>,
    overflowed: bool,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            all_integers: true,
            ..Self::default()
        }
    }

    fn push(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.non_null += 1;

        if let Value::Number(n) = value {
            self.numeric += 1;
            self.float_sum += n.as_f64().unwrap_or(0.0);
            match n.as_i64() {
                Some(i) if self.all_integers => match self.int_sum.checked_add(i) {
                    Some(sum) => self.int_sum = sum,
                    None => self.overflowed = true,
                },
                Some(_) => {}
                None => self.all_integers = false,
            }
        }

        let replace_min = self
            .min
            .as_ref()
            .is_none_or(|current| compare_values(value, current) == Ordering::Less);
        if replace_min {
            self.min = Some(value.clone());
        }
        let replace_max = self
            .max
            .as_ref()
            .is_none_or(|current| compare_values(value, current) == Ordering::Greater);
        if replace_max {
            self.max = Some(value.clone());
        }
    }

    fn finish(&self, function: AggregateFn) -> Value {
        match function {
            AggregateFn::Sum => {
                if self.all_integers && !self.overflowed {
                    Value::from(self.int_sum)
                } else {
                    float_value(self.float_sum)
                }
            }
            AggregateFn::Avg => {
                if self.numeric == 0 {
                    Value::Null
                } else {
                    float_value(self.float_sum / self.numeric as f64)
                }
            }
            AggregateFn::Count => Value::from(self.non_null),
            AggregateFn::Min => self.min.clone().unwrap_or(Value::Null),
            AggregateFn::Max => self.max.clone().unwrap_or(Value::Null),
        }
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Serialized key tuple; missing fields count as null
fn group_key(row: &Record, group_by: &[String]) -> String {
    let key: Vec<&Value> = group_by
        .iter()
        .map(|field| row.get(field).unwrap_or(&Value::Null))
        .collect();
    serde_json::to_string(&key).unwrap_or_default()
}

/// Aggregate `rows` grouped by `group_by`
///
/// With an empty `group_by`, every row falls into one group and a single
/// row is emitted (none if `rows` is empty).
#[must_use]
pub fn aggregate(
    rows: &[Record],
    group_by: &[String],
    aggregations: &IndexMap<String, AggregateFn>,
) -> Vec<Record> {
    let mut groups: IndexMap<String, (Record, IndexMap<&str, Accumulator>)> = IndexMap::new();

    for row in rows {
        let (_, accumulators) = groups.entry(group_key(row, group_by)).or_insert_with(|| {
            let key_fields: Record = group_by
                .iter()
                .map(|field| (field.clone(), row.get(field).cloned().unwrap_or(Value::Null)))
                .collect();
            let accumulators = aggregations
                .keys()
                .map(|field| (field.as_str(), Accumulator::new()))
                .collect();
            (key_fields, accumulators)
        });

        for (field, accumulator) in accumulators.iter_mut() {
            accumulator.push(row.get(*field).unwrap_or(&Value::Null));
        }
    }

    groups
        .into_values()
        .map(|(mut out, accumulators)| {
            for (field, function) in aggregations {
                let value = accumulators
                    .get(field.as_str())
                    .map_or(Value::Null, |acc| acc.finish(*function));
                out.insert(field.clone(), value);
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::record::records_from_json;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn aggs(pairs: &[(&str, AggregateFn)]) -> IndexMap<String, AggregateFn> {
        pairs.iter().map(|(k, f)| ((*k).to_string(), *f)).collect()
    }

    #[test]
    fn test_sum_per_group() {
        let rows = records_from_json(json!([
            {"k": "a", "v": 1},
            {"k": "b", "v": 10},
            {"k": "a", "v": 2},
            {"k": "b", "v": 5},
            {"k": "c", "v": 7}
        ]));

        let out = aggregate(&rows, &["k".to_string()], &aggs(&[("v", AggregateFn::Sum)]));
        assert_eq!(
            out,
            records_from_json(json!([
                {"k": "a", "v": 3},
                {"k": "b", "v": 15},
                {"k": "c", "v": 7}
            ]))
        );
    }

    #[test]
    fn test_all_functions() {
        let rows = records_from_json(json!([
            {"k": 1, "v": 4},
            {"k": 1, "v": 2.5},
            {"k": 1, "v": null},
            {"k": 1, "v": 9}
        ]));
        let out = aggregate(&rows, &["k".to_string()], &aggs(&[("v", AggregateFn::Avg)]));
        assert_eq!(out[0]["v"], json!(5.166666666666667));

        for (function, expected) in [
            (AggregateFn::Sum, json!(15.5)),
            (AggregateFn::Count, json!(3)),
            (AggregateFn::Min, json!(2.5)),
            (AggregateFn::Max, json!(9)),
        ] {
            let out = aggregate(&rows, &["k".to_string()], &aggs(&[("v", function)]));
            assert_eq!(out[0]["v"], expected, "{:?}", function);
        }
    }

    #[test]
    fn test_multi_key_grouping() {
        let rows = records_from_json(json!([
            {"region": "east", "year": 2023, "amount": 1},
            {"region": "east", "year": 2024, "amount": 2},
            {"region": "east", "year": 2023, "amount": 3}
        ]));
        let out = aggregate(
            &rows,
            &["region".to_string(), "year".to_string()],
            &aggs(&[("amount", AggregateFn::Sum)]),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["amount"], json!(4));
        assert_eq!(out[1]["year"], json!(2024));
    }

    #[test]
    fn test_missing_group_field_groups_as_null() {
        let rows = records_from_json(json!([{"v": 1}, {"v": 2}, {"k": "x", "v": 3}]));
        let out = aggregate(&rows, &["k".to_string()], &aggs(&[("v", AggregateFn::Sum)]));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["k"], Value::Null);
        assert_eq!(out[0]["v"], json!(3));
    }

    #[test]
    fn test_empty_group_by_single_row() {
        let rows = records_from_json(json!([{"v": 1}, {"v": 2}]));
        let out = aggregate(&rows, &[], &aggs(&[("v", AggregateFn::Count)]));
        assert_eq!(out, records_from_json(json!([{"v": 2}])));

        assert!(aggregate(&[], &[], &aggs(&[("v", AggregateFn::Count)])).is_empty());
    }

    #[test]
    fn test_avg_of_non_numeric_is_null() {
        let rows = records_from_json(json!([{"k": 1, "v": "x"}]));
        let out = aggregate(&rows, &["k".to_string()], &aggs(&[("v", AggregateFn::Avg)]));
        assert_eq!(out[0]["v"], Value::Null);
    }

    proptest! {
        #[test]
        fn prop_one_row_per_distinct_key(pairs in prop::collection::vec((0u8..6, -1000i64..1000), 0..60)) {
            let rows: Vec<Record> = pairs
                .iter()
                .map(|(k, v)| records_from_json(json!({"k": k, "v": v})).remove(0))
                .collect();

            let out = aggregate(&rows, &["k".to_string()], &aggs(&[("v", AggregateFn::Sum)]));

            let input_keys: BTreeSet<u8> = pairs.iter().map(|(k, _)| *k).collect();
            let output_keys: BTreeSet<u8> = out
                .iter()
                .map(|r| r["k"].as_u64().unwrap() as u8)
                .collect();
            prop_assert_eq!(out.len(), input_keys.len());
            prop_assert_eq!(&output_keys, &input_keys);

            for row in &out {
                let key = row["k"].as_u64().unwrap() as u8;
                let expected: i64 = pairs.iter().filter(|(k, _)| *k == key).map(|(_, v)| v).sum();
                prop_assert_eq!(row["v"].as_i64().unwrap(), expected);
            }
        }
    }
}
