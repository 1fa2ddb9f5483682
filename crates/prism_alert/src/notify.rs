//! Notification delivery.
//!
//! A [`Notifier`] delivers one notification to one channel. The
//! [`NotificationDispatcher`] fans a notification out to every channel of a
//! rule at once and only counts failures; nothing it sends can fail the
//! evaluation that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use prism_core::{AlertInstanceId, AlertRuleId};
use prism_storage::{AlertInstance, AlertRule, NotificationChannel, Severity};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, NotifyResult};

/// Body of every notification, whatever the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Short headline, `[severity] rule name`
    pub title: String,
    /// Instance message
    pub message: String,
    /// Instance severity
    pub severity: Severity,
    /// Rule that fired
    pub rule_id: AlertRuleId,
    /// Rule name
    pub rule_name: String,
    /// Instance raised
    pub instance_id: AlertInstanceId,
    /// Metric value at breach time
    pub triggered_value: f64,
    /// Threshold at breach time
    pub threshold_value: f64,
    /// Breach time
    pub triggered_at: DateTime<Utc>,
}

impl Notification {
    /// Notification announcing `instance` of `rule`
    #[must_use]
    pub fn for_instance(rule: &AlertRule, instance: &AlertInstance) -> Self {
        Self {
            title: format!("[{}] {}", instance.severity, rule.name),
            message: instance.message.clone(),
            severity: instance.severity,
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            instance_id: instance.id,
            triggered_value: instance.triggered_value,
            threshold_value: instance.threshold_value,
            triggered_at: instance.triggered_at,
        }
    }
}

/// Delivers a notification to one channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notification` to `channel`
    async fn send(&self, channel: &NotificationChannel, notification: &Notification) -> NotifyResult<()>;
}

/// One email, ready for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
}

/// Mail delivery backend
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver one message
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()>;
}

/// [`EmailTransport`] that writes the message to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailTransport;

#[async_trait]
impl EmailTransport for LogEmailTransport {
    async fn send(&self, message: &EmailMessage) -> NotifyResult<()> {
        info!(
            to = %message.to.join(","),
            subject = %message.subject,
            body = %message.body,
            "email notification"
        );
        Ok(())
    }
}

/// [`Notifier`] posting JSON over HTTP and handing email to a transport
///
/// Webhooks receive the [`Notification`] itself. Slack receives an incoming
/// webhook payload `{"text": …}` with the optional channel override.
#[derive(Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    email: Arc<dyn EmailTransport>,
}

impl HttpNotifier {
    /// Create a notifier with the given request timeout, logging email
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            email: Arc::new(LogEmailTransport),
        })
    }

    /// Replace the email transport
    #[must_use]
    pub fn with_email_transport(mut self, email: Arc<dyn EmailTransport>) -> Self {
        self.email = email;
        self
    }

    async fn post(
        &self,
        url: &str,
        headers: &IndexMap<String, String>,
        body: &serde_json::Value,
    ) -> NotifyResult<()> {
        let mut request = self.client.post(url).json(body);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Slack incoming-webhook payload for a notification
fn slack_payload(notification: &Notification, channel: Option<&str>) -> serde_json::Value {
    let mut payload = json!({
        "text": format!("*{}*\n{}", notification.title, notification.message),
    });
    if let Some(channel) = channel {
        payload["channel"] = json!(channel);
    }
    payload
}

fn email_message(recipients: &[String], notification: &Notification) -> EmailMessage {
    EmailMessage {
        to: recipients.to_vec(),
        subject: notification.title.clone(),
        body: format!(
            "{}\n\nValue: {}\nThreshold: {}\nTriggered at: {}\n",
            notification.message,
            notification.triggered_value,
            notification.threshold_value,
            notification.triggered_at.to_rfc3339()
        ),
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, channel: &NotificationChannel, notification: &Notification) -> NotifyResult<()> {
        match channel {
            NotificationChannel::Email { recipients } => {
                if recipients.is_empty() {
                    return Err(NotifyError::Undeliverable {
                        kind: channel.kind().to_string(),
                        reason: "no recipients".to_string(),
                    });
                }
                self.email.send(&email_message(recipients, notification)).await
            }
            NotificationChannel::Webhook { url, headers } => {
                let body = serde_json::to_value(notification).map_err(|e| NotifyError::Undeliverable {
                    kind: channel.kind().to_string(),
                    reason: e.to_string(),
                })?;
                self.post(url, headers, &body).await
            }
            NotificationChannel::Slack {
                webhook_url,
                channel: slack_channel,
            } => {
                let body = slack_payload(notification, slack_channel.as_deref());
                self.post(webhook_url, &IndexMap::new(), &body).await
            }
            NotificationChannel::Unsupported => Err(NotifyError::Undeliverable {
                kind: channel.kind().to_string(),
                reason: "unsupported channel type".to_string(),
            }),
        }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Channels delivered
    pub sent: usize,
    /// Channels that failed
    pub failed: usize,
}

/// Sends notifications to all channels of a rule concurrently
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    /// Create a dispatcher over `notifier`
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Deliver `notification` to every channel
    ///
    /// Each delivery is independent; failures are logged and counted.
    pub async fn dispatch(
        &self,
        channels: &[NotificationChannel],
        notification: &Notification,
    ) -> DispatchReport {
        let deliveries = channels.iter().map(|channel| async move {
            let result = self.notifier.send(channel, notification).await;
            match &result {
                Ok(()) => debug!(
                    channel = channel.kind(),
                    instance = %notification.instance_id,
                    "notification delivered"
                ),
                Err(e) => warn!(
                    channel = channel.kind(),
                    instance = %notification.instance_id,
                    error = %e,
                    "notification failed"
                ),
            }
            result.is_ok()
        });

        let outcomes = join_all(deliveries).await;
        let sent = outcomes.iter().filter(|ok| **ok).count();
        DispatchReport {
            sent,
            failed: outcomes.len() - sent,
        }
    }
}
