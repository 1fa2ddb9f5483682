//! Prism Runtime
//!
//! Drives report executions end to end (query, transform, visualize,
//! render, cache, persist), refreshes dashboard widgets, and triggers
//! scheduled reports.
//!
//! A trigger either serves the report cache or spawns a background task and
//! returns an [`ExecutionHandle`] at once. Everything that goes wrong inside
//! the task is recorded on the execution and never reaches the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod scheduler;

pub use config::EngineConfig;
pub use dashboard::{DashboardService, DashboardView, WidgetView};
pub use engine::{ExecutionHandle, ReportEngine, query_input};
pub use error::{EngineError, EngineResult};
pub use scheduler::ReportScheduler;
