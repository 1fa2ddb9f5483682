//! Alert rules and alert instances.
//!
//! Invariant: at most one `Active` instance per rule. Repositories enforce
//! it in [`crate::Repository::create_active_instance`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use prism_core::record::Value;
use prism_core::{AlertInstanceId, AlertRuleId, CoreError, CoreResult, SourceDescriptor};
use serde::{Deserialize, Serialize};

/// Threshold comparison, written as its symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// `>`
    #[serde(rename = ">", alias = "gt")]
    GreaterThan,
    /// `<`
    #[serde(rename = "<", alias = "lt")]
    LessThan,
    /// `>=`
    #[serde(rename = ">=", alias = "gte")]
    GreaterOrEqual,
    /// `<=`
    #[serde(rename = "<=", alias = "lte")]
    LessOrEqual,
    /// `==`
    #[serde(rename = "==", alias = "eq")]
    Equal,
    /// `!=`
    #[serde(rename = "!=", alias = "ne")]
    NotEqual,
}

impl ComparisonOperator {
    /// Operator symbol
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl std::str::FromStr for ComparisonOperator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(Self::GreaterThan),
            "<" | "lt" => Ok(Self::LessThan),
            ">=" | "gte" => Ok(Self::GreaterOrEqual),
            "<=" | "lte" => Ok(Self::LessOrEqual),
            "==" | "=" | "eq" => Ok(Self::Equal),
            "!=" | "<>" | "ne" => Ok(Self::NotEqual),
            other => Err(CoreError::validation(
                "condition.comparison_operator",
                format!("unknown operator '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Breach condition of a rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    /// Threshold the metric is compared against
    pub threshold_value: f64,
    /// `metric <op> threshold` means breach
    pub comparison_operator: ComparisonOperator,
}

/// Alert severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    #[serde(alias = "low")]
    Info,
    /// Needs attention
    #[default]
    #[serde(alias = "medium")]
    Warning,
    /// Needs immediate attention
    #[serde(alias = "high")]
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Where a notification goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Email to every recipient
    Email {
        /// Recipient addresses
        recipients: Vec<String>,
    },
    /// JSON POST to an HTTP endpoint
    Webhook {
        /// Endpoint URL
        url: String,
        /// Extra request headers
        #[serde(default)]
        headers: IndexMap<String, String>,
    },
    /// Slack incoming webhook
    Slack {
        /// Incoming webhook URL
        webhook_url: String,
        /// Channel override
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// Any other channel type; never delivered
    #[serde(other)]
    Unsupported,
}

impl NotificationChannel {
    /// Channel type tag, for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Email { .. } => "email",
            Self::Webhook { .. } => "webhook",
            Self::Slack { .. } => "slack",
            Self::Unsupported => "unsupported",
        }
    }
}

fn default_interval() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// A scheduled threshold check over one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule id
    #[serde(default)]
    pub id: AlertRuleId,
    /// Display name
    pub name: String,
    /// Source the metric is read from
    pub data_source: SourceDescriptor,
    /// Query text overriding the source's own `query`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Values for `${name}` placeholders
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
    /// Field of the first row holding the metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_field: Option<String>,
    /// Breach condition
    pub condition: AlertCondition,
    /// Severity of raised instances
    #[serde(default)]
    pub severity: Severity,
    /// Intended minutes between evaluations
    #[serde(default = "default_interval")]
    pub evaluation_interval_minutes: u32,
    /// Disabled rules are never evaluated
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// End of the last completed evaluation
    #[serde(default)]
    pub last_evaluated_at: Option<DateTime<Utc>>,
    /// Channels notified on a new breach, in order
    #[serde(default)]
    pub notification_config: Vec<NotificationChannel>,
}

impl AlertRule {
    /// Create an enabled rule with no notification channels
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_source: SourceDescriptor,
        threshold_value: f64,
        comparison_operator: ComparisonOperator,
    ) -> Self {
        Self {
            id: AlertRuleId::new(),
            name: name.into(),
            data_source,
            query: None,
            parameters: IndexMap::new(),
            metric_field: None,
            condition: AlertCondition {
                threshold_value,
                comparison_operator,
            },
            severity: Severity::default(),
            evaluation_interval_minutes: default_interval(),
            enabled: true,
            last_evaluated_at: None,
            notification_config: Vec::new(),
        }
    }

    /// Set the metric field
    #[must_use]
    pub fn with_metric_field(mut self, field: impl Into<String>) -> Self {
        self.metric_field = Some(field.into());
        self
    }

    /// Add a notification channel
    #[must_use]
    pub fn with_channel(mut self, channel: NotificationChannel) -> Self {
        self.notification_config.push(channel);
        self
    }

    /// Set the severity
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Check the rule definition
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        self.data_source.validate(self.query.as_deref())?;
        if !self.condition.threshold_value.is_finite() {
            return Err(CoreError::validation(
                "condition.threshold_value",
                "must be a finite number",
            ));
        }
        if self.evaluation_interval_minutes == 0 {
            return Err(CoreError::validation(
                "evaluation_interval_minutes",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Alert instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Breach raised, not yet handled
    Active,
    /// Seen by an operator
    Acknowledged,
    /// Closed
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// One breach occurrence of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertInstance {
    /// Instance id
    pub id: AlertInstanceId,
    /// Rule that fired
    pub rule_id: AlertRuleId,
    /// Current status
    pub status: AlertStatus,
    /// Copied from the rule
    pub severity: Severity,
    /// Metric value at breach time
    pub triggered_value: f64,
    /// Threshold at breach time
    pub threshold_value: f64,
    /// Human-readable summary
    pub message: String,
    /// When the breach was detected
    pub triggered_at: DateTime<Utc>,
    /// When an operator acknowledged it
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Who acknowledged it
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    /// When it was resolved
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Why it was resolved
    #[serde(default)]
    pub resolution_reason: Option<String>,
    /// Resolved by the evaluator rather than an operator
    #[serde(default)]
    pub auto_resolved: bool,
}

impl AlertInstance {
    /// New active instance for a breach of `rule`
    #[must_use]
    pub fn triggered(rule: &AlertRule, value: f64, now: DateTime<Utc>) -> Self {
        let condition = rule.condition;
        Self {
            id: AlertInstanceId::new(),
            rule_id: rule.id,
            status: AlertStatus::Active,
            severity: rule.severity,
            triggered_value: value,
            threshold_value: condition.threshold_value,
            message: format!(
                "Alert '{}': value {} {} threshold {}",
                rule.name, value, condition.comparison_operator, condition.threshold_value
            ),
            triggered_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolution_reason: None,
            auto_resolved: false,
        }
    }

    /// Whether this instance blocks new instances for its rule
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// `Active -> Acknowledged`
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the instance is active
    pub fn acknowledge(&mut self, by: Option<String>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != AlertStatus::Active {
            return Err(CoreError::validation(
                "status",
                format!("cannot acknowledge {} alert {}", self.status, self.id),
            ));
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_at = Some(now);
        self.acknowledged_by = by;
        Ok(())
    }

    /// `Active | Acknowledged -> Resolved`
    ///
    /// # Errors
    ///
    /// Returns a validation error if already resolved
    pub fn resolve(
        &mut self,
        reason: impl Into<String>,
        auto_resolved: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status == AlertStatus::Resolved {
            return Err(CoreError::validation(
                "status",
                format!("alert {} is already resolved", self.id),
            ));
        }
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(now);
        self.resolution_reason = Some(reason.into());
        self.auto_resolved = auto_resolved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn rule() -> AlertRule {
        AlertRule::new(
            "High error rate",
            SourceDescriptor::dataset("errors", "errors"),
            5.0,
            ComparisonOperator::GreaterThan,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_operator_symbols() {
        for symbol in [">", "<", ">=", "<=", "==", "!="] {
            let op: ComparisonOperator = symbol.parse().unwrap();
            assert_eq!(op.symbol(), symbol);
            assert_eq!(serde_json::to_value(op).unwrap(), json!(symbol));
        }
        assert!("~".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn test_rule_deserialize() {
        let rule: AlertRule = serde_json::from_value(json!({
            "name": "Queue depth",
            "data_source": {"name": "q", "type": "dataset", "config": {"dataset_id": "queue"}},
            "metric_field": "depth",
            "condition": {"threshold_value": 100, "comparison_operator": ">="},
            "severity": "high",
            "notification_config": [
                {"type": "email", "recipients": ["ops@example.com"]},
                {"type": "slack", "webhook_url": "https://hooks.slack.test/x"},
                {"type": "pager", "service": "p1"}
            ]
        }))
        .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.severity, Severity::Critical);
        assert_eq!(rule.condition.comparison_operator, ComparisonOperator::GreaterOrEqual);
        assert_eq!(rule.notification_config[2], NotificationChannel::Unsupported);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_rule_validate() {
        let mut bad = rule();
        bad.condition.threshold_value = f64::NAN;
        assert!(bad.validate().is_err());

        let mut bad = rule();
        bad.evaluation_interval_minutes = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_instance_lifecycle() {
        let rule = rule();
        let mut instance = AlertInstance::triggered(&rule, 7.5, now());
        assert!(instance.is_active());
        assert_eq!(instance.message, "Alert 'High error rate': value 7.5 > threshold 5");

        instance.acknowledge(Some("sam".to_string()), now()).unwrap();
        assert!(!instance.is_active());
        assert!(instance.acknowledge(None, now()).is_err());

        instance.resolve("fixed", false, now()).unwrap();
        assert_eq!(instance.status, AlertStatus::Resolved);
        assert!(!instance.auto_resolved);
        assert!(instance.resolve("again", true, now()).is_err());
    }
}
