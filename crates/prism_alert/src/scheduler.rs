//! Periodic driver for the alert evaluator.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::evaluator::AlertEvaluator;

/// Runs [`AlertEvaluator::evaluate_tick`] on a fixed interval
pub struct AlertScheduler {
    evaluator: AlertEvaluator,
    tick: Duration,
}

impl AlertScheduler {
    /// Create a scheduler ticking every `tick_secs` of the evaluator's config
    #[must_use]
    pub fn new(evaluator: AlertEvaluator) -> Self {
        let tick = Duration::from_secs(evaluator.config().tick_secs.max(1));
        Self { evaluator, tick }
    }

    /// Override the tick interval
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Tick until `shutdown` turns true or its sender is dropped
    ///
    /// A tick that cannot even list rules is logged and retried next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick_secs = self.tick.as_secs(), "alert scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.evaluator.evaluate_tick().await {
                        warn!(error = %e, "alert tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("alert scheduler stopped");
    }
}
