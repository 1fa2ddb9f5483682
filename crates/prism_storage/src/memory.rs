//! In-memory repository.

use async_trait::async_trait;
use prism_core::{AlertInstanceId, AlertRuleId, DashboardId, ExecutionId, ReportId, WidgetId};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::alert::{AlertInstance, AlertRule};
use crate::dashboard::{Dashboard, Widget};
use crate::error::StorageResult;
use crate::execution::Execution;
use crate::report::ReportDefinition;
use crate::repository::{
    Repository, sort_dashboards, sort_executions, sort_instances, sort_reports, sort_rules,
    sort_widgets,
};

/// [`Repository`] holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    reports: RwLock<HashMap<ReportId, ReportDefinition>>,
    executions: RwLock<HashMap<ExecutionId, Execution>>,
    dashboards: RwLock<HashMap<DashboardId, Dashboard>>,
    widgets: RwLock<HashMap<WidgetId, Widget>>,
    rules: RwLock<HashMap<AlertRuleId, AlertRule>>,
    instances: RwLock<HashMap<AlertInstanceId, AlertInstance>>,
}

impl MemoryRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<ReportDefinition>> {
        Ok(self.reports.read().await.get(id).cloned())
    }

    async fn save_report(&self, report: &ReportDefinition) -> StorageResult<()> {
        self.reports.write().await.insert(report.id, report.clone());
        Ok(())
    }

    async fn list_reports(&self) -> StorageResult<Vec<ReportDefinition>> {
        let mut reports: Vec<_> = self.reports.read().await.values().cloned().collect();
        sort_reports(&mut reports);
        Ok(reports)
    }

    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Option<Execution>> {
        Ok(self.executions.read().await.get(id).cloned())
    }

    async fn save_execution(&self, execution: &Execution) -> StorageResult<()> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn list_executions(&self, report_id: &ReportId) -> StorageResult<Vec<Execution>> {
        let mut executions: Vec<_> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.report_id == *report_id)
            .cloned()
            .collect();
        sort_executions(&mut executions);
        Ok(executions)
    }

    async fn get_dashboard(&self, id: &DashboardId) -> StorageResult<Option<Dashboard>> {
        Ok(self.dashboards.read().await.get(id).cloned())
    }

    async fn save_dashboard(&self, dashboard: &Dashboard) -> StorageResult<()> {
        self.dashboards
            .write()
            .await
            .insert(dashboard.id, dashboard.clone());
        Ok(())
    }

    async fn list_dashboards(&self) -> StorageResult<Vec<Dashboard>> {
        let mut dashboards: Vec<_> = self.dashboards.read().await.values().cloned().collect();
        sort_dashboards(&mut dashboards);
        Ok(dashboards)
    }

    async fn get_widget(&self, id: &WidgetId) -> StorageResult<Option<Widget>> {
        Ok(self.widgets.read().await.get(id).cloned())
    }

    async fn save_widget(&self, widget: &Widget) -> StorageResult<()> {
        self.widgets.write().await.insert(widget.id, widget.clone());
        Ok(())
    }

    async fn list_widgets(&self, dashboard_id: &DashboardId) -> StorageResult<Vec<Widget>> {
        let mut widgets: Vec<_> = self
            .widgets
            .read()
            .await
            .values()
            .filter(|w| w.dashboard_id == *dashboard_id)
            .cloned()
            .collect();
        sort_widgets(&mut widgets);
        Ok(widgets)
    }

    async fn get_alert_rule(&self, id: &AlertRuleId) -> StorageResult<Option<AlertRule>> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn save_alert_rule(&self, rule: &AlertRule) -> StorageResult<()> {
        self.rules.write().await.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn list_alert_rules(&self) -> StorageResult<Vec<AlertRule>> {
        let mut rules: Vec<_> = self.rules.read().await.values().cloned().collect();
        sort_rules(&mut rules);
        Ok(rules)
    }

    async fn get_alert_instance(&self, id: &AlertInstanceId) -> StorageResult<Option<AlertInstance>> {
        Ok(self.instances.read().await.get(id).cloned())
    }

    async fn save_alert_instance(&self, instance: &AlertInstance) -> StorageResult<()> {
        self.instances
            .write()
            .await
            .insert(instance.id, instance.clone());
        Ok(())
    }

    async fn list_alert_instances(
        &self,
        rule_id: Option<&AlertRuleId>,
    ) -> StorageResult<Vec<AlertInstance>> {
        let mut instances: Vec<_> = self
            .instances
            .read()
            .await
            .values()
            .filter(|i| rule_id.is_none_or(|id| i.rule_id == *id))
            .cloned()
            .collect();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn create_active_instance(&self, instance: &AlertInstance) -> StorageResult<bool> {
        let mut instances = self.instances.write().await;
        let blocked = instances
            .values()
            .any(|i| i.rule_id == instance.rule_id && i.is_active());
        if blocked {
            return Ok(false);
        }
        instances.insert(instance.id, instance.clone());
        Ok(true)
    }
}
