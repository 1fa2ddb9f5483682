//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Report engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Await the background task before `trigger` returns
    ///
    /// The task is still spawned; only the caller waits. Meant for tests
    /// and one-shot command line runs.
    pub await_completion: bool,
    /// Seconds between report scheduler ticks
    pub scheduler_tick_secs: u64,
    /// Rows embedded in each chart payload (0 = all)
    pub max_chart_points: usize,
}

impl EngineConfig {
    /// Set `await_completion`
    #[must_use]
    pub fn with_await_completion(mut self, await_completion: bool) -> Self {
        self.await_completion = await_completion;
        self
    }

    /// Set the scheduler tick
    #[must_use]
    pub fn with_scheduler_tick_secs(mut self, secs: u64) -> Self {
        self.scheduler_tick_secs = secs;
        self
    }

    /// Set the chart point cap
    #[must_use]
    pub fn with_max_chart_points(mut self, max: usize) -> Self {
        self.max_chart_points = max;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            await_completion: false,
            scheduler_tick_secs: 60,
            max_chart_points: 0,
        }
    }
}
