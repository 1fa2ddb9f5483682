//! Alert evaluation loop.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use prism_core::{AlertInstanceId, AlertRuleId, Clock, SystemClock};
use prism_query::{QueryExecutor, QueryInput};
use prism_storage::{AlertInstance, AlertRule, AlertStatus, Repository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::comparator::{compare, metric_value};
use crate::config::AlertConfig;
use crate::error::{AlertError, AlertResult};
use crate::notify::{DispatchReport, Notification, NotificationDispatcher};

/// What one tick did with one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    /// Fetch failed or yielded no value; `last_evaluated_at` untouched
    Skipped {
        /// Rule evaluated
        rule_id: AlertRuleId,
        /// Why
        reason: String,
    },
    /// Metric within threshold
    Clear {
        /// Rule evaluated
        rule_id: AlertRuleId,
        /// Metric value
        value: f64,
        /// Instances closed by auto-resolution
        resolved: Vec<AlertInstanceId>,
    },
    /// Metric breached and a new instance opened
    Triggered {
        /// Rule evaluated
        rule_id: AlertRuleId,
        /// Metric value
        value: f64,
        /// The new instance
        instance_id: AlertInstanceId,
        /// Notification fan-out result
        notifications: DispatchReport,
    },
    /// Metric breached but the rule already has an active instance
    Deduplicated {
        /// Rule evaluated
        rule_id: AlertRuleId,
        /// Metric value
        value: f64,
    },
}

impl RuleOutcome {
    /// Rule this outcome belongs to
    #[must_use]
    pub fn rule_id(&self) -> AlertRuleId {
        match self {
            Self::Skipped { rule_id, .. }
            | Self::Clear { rule_id, .. }
            | Self::Triggered { rule_id, .. }
            | Self::Deduplicated { rule_id, .. } => *rule_id,
        }
    }
}

/// Summary of one evaluation tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// One entry per enabled rule, in rule order
    pub outcomes: Vec<RuleOutcome>,
}

impl TickReport {
    /// Instances opened this tick
    #[must_use]
    pub fn triggered(&self) -> usize {
        self.count(|o| matches!(o, RuleOutcome::Triggered { .. }))
    }

    /// Rules skipped this tick
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RuleOutcome::Skipped { .. }))
    }

    /// Breaches absorbed by an existing active instance
    #[must_use]
    pub fn deduplicated(&self) -> usize {
        self.count(|o| matches!(o, RuleOutcome::Deduplicated { .. }))
    }

    fn count(&self, pred: impl Fn(&RuleOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Evaluates alert rules and manages alert instances
#[derive(Clone)]
pub struct AlertEvaluator {
    repo: Arc<dyn Repository>,
    executor: QueryExecutor,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    config: AlertConfig,
}

impl AlertEvaluator {
    /// Create an evaluator on the system clock
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        executor: QueryExecutor,
        dispatcher: NotificationDispatcher,
        config: AlertConfig,
    ) -> Self {
        Self {
            repo,
            executor,
            dispatcher,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The alert configuration
    #[must_use]
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Evaluate every enabled rule once
    ///
    /// Rules run concurrently and independently. A rule whose evaluation
    /// errors after the metric was read is reported as skipped.
    ///
    /// # Errors
    ///
    /// Returns error only if the rule list cannot be read
    pub async fn evaluate_tick(&self) -> AlertResult<TickReport> {
        let rules = self.repo.list_enabled_alert_rules().await?;
        let outcomes = join_all(rules.iter().map(|rule| async move {
            match self.evaluate_rule(rule).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(rule = %rule.id, error = %e, "alert rule evaluation failed");
                    RuleOutcome::Skipped {
                        rule_id: rule.id,
                        reason: e.to_string(),
                    }
                }
            }
        }))
        .await;

        let report = TickReport { outcomes };
        info!(
            rules = report.outcomes.len(),
            triggered = report.triggered(),
            deduplicated = report.deduplicated(),
            skipped = report.skipped(),
            "alert tick finished"
        );
        Ok(report)
    }

    /// Evaluate one rule
    ///
    /// # Errors
    ///
    /// Returns storage errors; fetch failures come back as `Skipped`
    pub async fn evaluate_rule(&self, rule: &AlertRule) -> AlertResult<RuleOutcome> {
        let value = match self.fetch_metric(rule).await {
            Ok(value) => value,
            Err(e) => {
                warn!(rule = %rule.id, name = %rule.name, error = %e, "skipping alert rule");
                return Ok(RuleOutcome::Skipped {
                    rule_id: rule.id,
                    reason: e.to_string(),
                });
            }
        };

        let condition = rule.condition;
        let breached = compare(value, condition.threshold_value, condition.comparison_operator);
        let now = self.clock.now();
        debug!(rule = %rule.id, value, breached, "alert rule evaluated");

        let outcome = if breached {
            self.on_breach(rule, value, now).await
        } else if self.config.auto_resolve {
            self.auto_resolve(rule, now)
                .await
                .map(|resolved| RuleOutcome::Clear {
                    rule_id: rule.id,
                    value,
                    resolved,
                })
        } else {
            Ok(RuleOutcome::Clear {
                rule_id: rule.id,
                value,
                resolved: Vec::new(),
            })
        };

        // Stamped whatever the breach handling did
        self.stamp_evaluated(&rule.id, now).await?;
        outcome
    }

    async fn fetch_metric(&self, rule: &AlertRule) -> AlertResult<f64> {
        let input = QueryInput {
            query: rule.query.clone(),
            params: rule.parameters.clone(),
            filters: IndexMap::new(),
        };
        let rows = self.executor.execute(&rule.data_source, &input).await?;
        metric_value(&rows, rule.metric_field.as_deref()).ok_or_else(|| AlertError::NoMetric {
            rule: rule.name.clone(),
        })
    }

    async fn on_breach(&self, rule: &AlertRule, value: f64, now: DateTime<Utc>) -> AlertResult<RuleOutcome> {
        let instance = AlertInstance::triggered(rule, value, now);
        if !self.repo.create_active_instance(&instance).await? {
            debug!(rule = %rule.id, value, "breach absorbed by active instance");
            return Ok(RuleOutcome::Deduplicated {
                rule_id: rule.id,
                value,
            });
        }

        warn!(
            rule = %rule.id,
            instance = %instance.id,
            severity = %instance.severity,
            value,
            threshold = instance.threshold_value,
            "alert triggered"
        );

        let notification = Notification::for_instance(rule, &instance);
        let notifications = self
            .dispatcher
            .dispatch(&rule.notification_config, &notification)
            .await;

        Ok(RuleOutcome::Triggered {
            rule_id: rule.id,
            value,
            instance_id: instance.id,
            notifications,
        })
    }

    async fn auto_resolve(&self, rule: &AlertRule, now: DateTime<Utc>) -> AlertResult<Vec<AlertInstanceId>> {
        let mut resolved = Vec::new();
        for mut instance in self.repo.list_alert_instances(Some(&rule.id)).await? {
            if instance.status == AlertStatus::Resolved {
                continue;
            }
            instance.resolve("metric back within threshold", true, now)?;
            self.repo.save_alert_instance(&instance).await?;
            info!(rule = %rule.id, instance = %instance.id, "alert auto-resolved");
            resolved.push(instance.id);
        }
        Ok(resolved)
    }

    async fn stamp_evaluated(&self, rule_id: &AlertRuleId, now: DateTime<Utc>) -> AlertResult<()> {
        // Re-read so edits made during evaluation are kept
        let Some(mut rule) = self.repo.get_alert_rule(rule_id).await? else {
            return Ok(());
        };
        rule.last_evaluated_at = Some(now);
        self.repo.save_alert_rule(&rule).await?;
        Ok(())
    }

    /// Acknowledge an active instance
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown instance, `Validation` unless it is active
    pub async fn acknowledge(
        &self,
        instance_id: &AlertInstanceId,
        by: Option<String>,
    ) -> AlertResult<AlertInstance> {
        let mut instance = self.load_instance(instance_id).await?;
        instance.acknowledge(by, self.clock.now())?;
        self.repo.save_alert_instance(&instance).await?;
        info!(instance = %instance.id, by = ?instance.acknowledged_by, "alert acknowledged");
        Ok(instance)
    }

    /// Resolve an instance by hand
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown instance, `Validation` if already resolved
    pub async fn resolve(
        &self,
        instance_id: &AlertInstanceId,
        reason: impl Into<String>,
    ) -> AlertResult<AlertInstance> {
        let mut instance = self.load_instance(instance_id).await?;
        instance.resolve(reason, false, self.clock.now())?;
        self.repo.save_alert_instance(&instance).await?;
        info!(instance = %instance.id, "alert resolved");
        Ok(instance)
    }

    async fn load_instance(&self, instance_id: &AlertInstanceId) -> AlertResult<AlertInstance> {
        self.repo
            .get_alert_instance(instance_id)
            .await?
            .ok_or_else(|| AlertError::not_found("alert_instance", instance_id))
    }
}
