//! Prism Storage
//!
//! The persisted entities (reports, executions, dashboards, widgets, alert
//! rules, alert instances) and the [`Repository`] they are read from and
//! written to. Two backends ship: [`MemoryRepository`] and the redb-backed
//! [`RedbRepository`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alert;
pub mod dashboard;
pub mod error;
pub mod execution;
pub mod memory;
pub mod redb_store;
pub mod report;
pub mod repository;

pub use alert::{
    AlertCondition, AlertInstance, AlertRule, AlertStatus, ComparisonOperator, NotificationChannel,
    Severity,
};
pub use dashboard::{Dashboard, Widget, WidgetPosition};
pub use error::{StorageError, StorageResult};
pub use execution::{Execution, ExecutionStatus, TriggerType};
pub use memory::MemoryRepository;
pub use redb_store::RedbRepository;
pub use report::{QueryConfig, ReportDefinition, ReportSchedule};
pub use repository::Repository;
