//! Prism Transform Pipeline
//!
//! Applies an ordered list of steps to rows. Steps run strictly in the
//! declared order; nothing is reordered or fused.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod pipeline;
pub mod step;

pub use aggregate::aggregate;
pub use pipeline::transform;
pub use step::{AggregateFn, FilterOperator, TransformStep};
