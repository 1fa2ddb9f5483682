//! Ordered step execution.

use prism_core::record::{Record, Value, compare_values};
use tracing::{debug, warn};

use crate::aggregate::aggregate;
use crate::step::TransformStep;

fn apply_step(mut rows: Vec<Record>, step: &TransformStep) -> Vec<Record> {
    let before = rows.len();
    let rows = match step {
        TransformStep::Aggregation {
            group_by,
            aggregations,
        } => aggregate(&rows, group_by, aggregations),
        TransformStep::Filter {
            field,
            operator,
            value,
        } => rows
            .into_iter()
            .filter(|row| operator.matches(row.get(field).unwrap_or(&Value::Null), value))
            .collect(),
        TransformStep::Sort { field, ascending } => {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                if *ascending { ord } else { ord.reverse() }
            });
            rows
        }
        TransformStep::Limit { n } => {
            rows.truncate(*n);
            rows
        }
        TransformStep::Unknown => {
            warn!("skipping transform step of unknown type");
            rows
        }
    };
    debug!(step = step.kind(), before, after = rows.len(), "transform step applied");
    rows
}

/// Apply `steps` to `rows` in order
#[must_use]
pub fn transform(rows: Vec<Record>, steps: &[TransformStep]) -> Vec<Record> {
    steps.iter().fold(rows, apply_step)
}
