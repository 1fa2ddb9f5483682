//! Execution records and their state machine.
//!
//! `Queued -> Running -> {Completed | Failed}`. Cache hits are recorded as
//! executions created directly in `Completed`. `Cancelled` has no inbound
//! transition.

use chrono::{DateTime, Utc};
use prism_core::clock::elapsed_millis;
use prism_core::record::Value;
use prism_core::{CoreError, CoreResult, ExecutionId, ReportId};
use prism_render::Artifact;
use serde::{Deserialize, Serialize};

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created, not started
    Queued,
    /// Background task running
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
    /// Reserved; nothing transitions here
    Cancelled,
}

impl ExecutionStatus {
    /// Whether the execution can no longer change
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// What started an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    /// User request
    Manual,
    /// Report scheduler
    Scheduled,
    /// API caller
    Api,
    /// Served from the report cache
    Cached,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Api => "api",
            Self::Cached => "cached",
        };
        f.write_str(s)
    }
}

/// One run of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Unique per run
    pub id: ExecutionId,
    /// Report that ran
    pub report_id: ReportId,
    /// Current status
    pub status: ExecutionStatus,
    /// What started it
    pub trigger_type: TriggerType,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When it entered `Running`
    pub started_at: Option<DateTime<Utc>>,
    /// When it reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall time from start to completion
    pub duration_ms: Option<u64>,
    /// Result data and visualizations
    pub result_payload: Option<Value>,
    /// Rendered files
    #[serde(default)]
    pub output_artifacts: Vec<Artifact>,
    /// Failure description
    pub error: Option<String>,
}

impl Execution {
    /// New execution in `Queued`
    #[must_use]
    pub fn queued(report_id: ReportId, trigger_type: TriggerType, now: DateTime<Utc>) -> Self {
        Self {
            id: ExecutionId::new(),
            report_id,
            status: ExecutionStatus::Queued,
            trigger_type,
            created_at: now,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            result_payload: None,
            output_artifacts: Vec::new(),
            error: None,
        }
    }

    /// Completed execution served from cache, with zero duration
    #[must_use]
    pub fn cached(report_id: ReportId, payload: Value, now: DateTime<Utc>) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            started_at: Some(now),
            completed_at: Some(now),
            duration_ms: Some(0),
            result_payload: Some(payload),
            ..Self::queued(report_id, TriggerType::Cached, now)
        }
    }

    fn invalid_transition(&self, to: ExecutionStatus) -> CoreError {
        CoreError::validation(
            "status",
            format!("cannot move execution {} from {} to {}", self.id, self.status, to),
        )
    }

    /// `Queued -> Running`
    ///
    /// # Errors
    ///
    /// Returns a validation error from any other status
    pub fn start(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != ExecutionStatus::Queued {
            return Err(self.invalid_transition(ExecutionStatus::Running));
        }
        self.status = ExecutionStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// `Running -> Completed`
    ///
    /// # Errors
    ///
    /// Returns a validation error from any other status
    pub fn complete(
        &mut self,
        payload: Value,
        artifacts: Vec<Artifact>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status != ExecutionStatus::Running {
            return Err(self.invalid_transition(ExecutionStatus::Completed));
        }
        self.status = ExecutionStatus::Completed;
        self.result_payload = Some(payload);
        self.output_artifacts = artifacts;
        self.finish(now);
        Ok(())
    }

    /// `Queued | Running -> Failed`
    ///
    /// # Errors
    ///
    /// Returns a validation error from a terminal status
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(self.invalid_transition(ExecutionStatus::Failed));
        }
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.finish(now);
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        let start = self.started_at.unwrap_or(self.created_at);
        self.completed_at = Some(now);
        self.duration_ms = Some(elapsed_millis(start, now));
    }

    /// Whether the execution can no longer change
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
