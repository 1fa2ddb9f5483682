//! Prism Core Types
//!
//! Pure types shared by every Prism crate: identifiers, the record model,
//! cache state, clocks, and data-source descriptors. No I/O lives here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod clock;
pub mod error;
pub mod id;
pub mod record;
pub mod source;

// Re-exports
pub use cache::CacheState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use id::{AlertInstanceId, AlertRuleId, DashboardId, ExecutionId, ReportId, WidgetId};
pub use record::{Record, Value};
pub use source::{SourceDescriptor, SourceKind};
