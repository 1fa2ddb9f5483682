//! Prism Alerts
//!
//! Periodic threshold evaluation over alert rules. Each tick fetches one
//! metric per enabled rule, compares it to the rule's threshold, opens at
//! most one active instance per rule, and notifies the rule's channels when
//! a new instance opens.
//!
//! Rules are isolated from each other: a failing fetch skips only that rule,
//! and a failing channel never blocks its siblings.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comparator;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod notify;
pub mod scheduler;

pub use comparator::{compare, metric_value};
pub use config::AlertConfig;
pub use error::{AlertError, AlertResult, NotifyError, NotifyResult};
pub use evaluator::{AlertEvaluator, RuleOutcome, TickReport};
pub use notify::{
    DispatchReport, EmailMessage, EmailTransport, HttpNotifier, LogEmailTransport, Notification,
    NotificationDispatcher, Notifier,
};
pub use scheduler::AlertScheduler;
