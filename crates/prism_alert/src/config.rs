//! Alert loop configuration.

use serde::{Deserialize, Serialize};

/// Alert evaluation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Seconds between evaluation ticks
    pub tick_secs: u64,
    /// Resolve open instances when their metric no longer breaches
    pub auto_resolve: bool,
    /// Timeout for webhook and Slack deliveries, in seconds
    pub notify_timeout_secs: u64,
}

impl AlertConfig {
    /// Set the tick
    #[must_use]
    pub fn with_tick_secs(mut self, secs: u64) -> Self {
        self.tick_secs = secs;
        self
    }

    /// Set `auto_resolve`
    #[must_use]
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            auto_resolve: false,
            notify_timeout_secs: 10,
        }
    }
}
