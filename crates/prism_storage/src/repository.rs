//! Persistence interface consumed by the engine.

use async_trait::async_trait;
use prism_core::{AlertInstanceId, AlertRuleId, DashboardId, ExecutionId, ReportId, WidgetId};

use crate::alert::{AlertInstance, AlertRule};
use crate::dashboard::{Dashboard, Widget};
use crate::error::StorageResult;
use crate::execution::Execution;
use crate::report::ReportDefinition;

/// Repository for every persisted entity
///
/// `save_*` upserts by id. List results are deterministic: reports,
/// dashboards, and rules by name; executions newest first; widgets by
/// grid position; instances by trigger time.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load a report
    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<ReportDefinition>>;
    /// Upsert a report
    async fn save_report(&self, report: &ReportDefinition) -> StorageResult<()>;
    /// All reports
    async fn list_reports(&self) -> StorageResult<Vec<ReportDefinition>>;

    /// Load an execution
    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Option<Execution>>;
    /// Upsert an execution
    async fn save_execution(&self, execution: &Execution) -> StorageResult<()>;
    /// Executions of one report, newest first
    async fn list_executions(&self, report_id: &ReportId) -> StorageResult<Vec<Execution>>;

    /// Load a dashboard
    async fn get_dashboard(&self, id: &DashboardId) -> StorageResult<Option<Dashboard>>;
    /// Upsert a dashboard
    async fn save_dashboard(&self, dashboard: &Dashboard) -> StorageResult<()>;
    /// All dashboards
    async fn list_dashboards(&self) -> StorageResult<Vec<Dashboard>>;

    /// Load a widget
    async fn get_widget(&self, id: &WidgetId) -> StorageResult<Option<Widget>>;
    /// Upsert a widget
    async fn save_widget(&self, widget: &Widget) -> StorageResult<()>;
    /// Widgets belonging to one dashboard
    async fn list_widgets(&self, dashboard_id: &DashboardId) -> StorageResult<Vec<Widget>>;

    /// Load an alert rule
    async fn get_alert_rule(&self, id: &AlertRuleId) -> StorageResult<Option<AlertRule>>;
    /// Upsert an alert rule
    async fn save_alert_rule(&self, rule: &AlertRule) -> StorageResult<()>;
    /// All alert rules
    async fn list_alert_rules(&self) -> StorageResult<Vec<AlertRule>>;

    /// Rules with `enabled = true`
    async fn list_enabled_alert_rules(&self) -> StorageResult<Vec<AlertRule>> {
        Ok(self
            .list_alert_rules()
            .await?
            .into_iter()
            .filter(|rule| rule.enabled)
            .collect())
    }

    /// Load an alert instance
    async fn get_alert_instance(&self, id: &AlertInstanceId) -> StorageResult<Option<AlertInstance>>;
    /// Upsert an alert instance
    async fn save_alert_instance(&self, instance: &AlertInstance) -> StorageResult<()>;
    /// Instances, optionally for one rule only
    async fn list_alert_instances(
        &self,
        rule_id: Option<&AlertRuleId>,
    ) -> StorageResult<Vec<AlertInstance>>;

    /// The active instance of a rule, if any
    async fn active_instance(&self, rule_id: &AlertRuleId) -> StorageResult<Option<AlertInstance>> {
        Ok(self
            .list_alert_instances(Some(rule_id))
            .await?
            .into_iter()
            .find(AlertInstance::is_active))
    }

    /// Insert `instance` unless its rule already has an active instance
    ///
    /// The check and the insert are one atomic step. Returns whether the
    /// instance was stored.
    async fn create_active_instance(&self, instance: &AlertInstance) -> StorageResult<bool>;
}

pub(crate) fn sort_reports(reports: &mut [ReportDefinition]) {
    reports.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

pub(crate) fn sort_executions(executions: &mut [Execution]) {
    executions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

pub(crate) fn sort_dashboards(dashboards: &mut [Dashboard]) {
    dashboards.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

pub(crate) fn sort_widgets(widgets: &mut [Widget]) {
    widgets.sort_by_key(|w| (w.position.y, w.position.x, w.id));
}

pub(crate) fn sort_rules(rules: &mut [AlertRule]) {
    rules.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

pub(crate) fn sort_instances(instances: &mut [AlertInstance]) {
    instances.sort_by(|a, b| a.triggered_at.cmp(&b.triggered_at).then(a.id.cmp(&b.id)));
}
