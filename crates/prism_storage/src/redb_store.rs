//! redb-backed repository.
//!
//! One table per entity kind, keyed by the bare UUID of the entity id, with
//! the entity stored as JSON. redb is synchronous; every call runs on the
//! blocking pool.

use async_trait::async_trait;
use prism_core::{AlertInstanceId, AlertRuleId, DashboardId, ExecutionId, ReportId, WidgetId};
use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::alert::{AlertInstance, AlertRule};
use crate::dashboard::{Dashboard, Widget};
use crate::error::{StorageError, StorageResult};
use crate::execution::Execution;
use crate::report::ReportDefinition;
use crate::repository::{
    Repository, sort_dashboards, sort_executions, sort_instances, sort_reports, sort_rules,
    sort_widgets,
};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

const REPORTS: Table = TableDefinition::new("reports");
const EXECUTIONS: Table = TableDefinition::new("executions");
const DASHBOARDS: Table = TableDefinition::new("dashboards");
const WIDGETS: Table = TableDefinition::new("widgets");
const ALERT_RULES: Table = TableDefinition::new("alert_rules");
const ALERT_INSTANCES: Table = TableDefinition::new("alert_instances");

const ALL_TABLES: [Table; 6] = [
    REPORTS,
    EXECUTIONS,
    DASHBOARDS,
    WIDGETS,
    ALERT_RULES,
    ALERT_INSTANCES,
];

/// [`Repository`] persisted in a single redb file
#[derive(Clone)]
pub struct RedbRepository {
    db: Arc<Database>,
}

impl RedbRepository {
    /// Open or create the database at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or the tables created
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let db = Database::create(path)?;

        // Read transactions fail on tables that were never created
        let txn = db.begin_write()?;
        for table in ALL_TABLES {
            txn.open_table(table)?;
        }
        txn.commit()?;

        info!(path = %path.display(), "opened redb repository");
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    async fn get<V>(&self, table: Table, key: String) -> StorageResult<Option<V>>
    where
        V: DeserializeOwned + Send + 'static,
    {
        self.blocking(move |db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(table)?;
            match table.get(key.as_str())? {
                Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put<V: Serialize>(&self, table: Table, key: String, value: &V) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.blocking(move |db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(table)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn scan<V>(&self, table: Table) -> StorageResult<Vec<V>>
    where
        V: DeserializeOwned + Send + 'static,
    {
        self.blocking(move |db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(table)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, bytes) = entry?;
                out.push(serde_json::from_slice(bytes.value())?);
            }
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl Repository for RedbRepository {
    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<ReportDefinition>> {
        self.get(REPORTS, id.key()).await
    }

    async fn save_report(&self, report: &ReportDefinition) -> StorageResult<()> {
        self.put(REPORTS, report.id.key(), report).await
    }

    async fn list_reports(&self) -> StorageResult<Vec<ReportDefinition>> {
        let mut reports = self.scan(REPORTS).await?;
        sort_reports(&mut reports);
        Ok(reports)
    }

    async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Option<Execution>> {
        self.get(EXECUTIONS, id.key()).await
    }

    async fn save_execution(&self, execution: &Execution) -> StorageResult<()> {
        self.put(EXECUTIONS, execution.id.key(), execution).await
    }

    async fn list_executions(&self, report_id: &ReportId) -> StorageResult<Vec<Execution>> {
        let mut executions: Vec<Execution> = self
            .scan(EXECUTIONS)
            .await?
            .into_iter()
            .filter(|e: &Execution| e.report_id == *report_id)
            .collect();
        sort_executions(&mut executions);
        Ok(executions)
    }

    async fn get_dashboard(&self, id: &DashboardId) -> StorageResult<Option<Dashboard>> {
        self.get(DASHBOARDS, id.key()).await
    }

    async fn save_dashboard(&self, dashboard: &Dashboard) -> StorageResult<()> {
        self.put(DASHBOARDS, dashboard.id.key(), dashboard).await
    }

    async fn list_dashboards(&self) -> StorageResult<Vec<Dashboard>> {
        let mut dashboards = self.scan(DASHBOARDS).await?;
        sort_dashboards(&mut dashboards);
        Ok(dashboards)
    }

    async fn get_widget(&self, id: &WidgetId) -> StorageResult<Option<Widget>> {
        self.get(WIDGETS, id.key()).await
    }

    async fn save_widget(&self, widget: &Widget) -> StorageResult<()> {
        self.put(WIDGETS, widget.id.key(), widget).await
    }

    async fn list_widgets(&self, dashboard_id: &DashboardId) -> StorageResult<Vec<Widget>> {
        let mut widgets: Vec<Widget> = self
            .scan(WIDGETS)
            .await?
            .into_iter()
            .filter(|w: &Widget| w.dashboard_id == *dashboard_id)
            .collect();
        sort_widgets(&mut widgets);
        Ok(widgets)
    }

    async fn get_alert_rule(&self, id: &AlertRuleId) -> StorageResult<Option<AlertRule>> {
        self.get(ALERT_RULES, id.key()).await
    }

    async fn save_alert_rule(&self, rule: &AlertRule) -> StorageResult<()> {
        self.put(ALERT_RULES, rule.id.key(), rule).await
    }

    async fn list_alert_rules(&self) -> StorageResult<Vec<AlertRule>> {
        let mut rules = self.scan(ALERT_RULES).await?;
        sort_rules(&mut rules);
        Ok(rules)
    }

    async fn get_alert_instance(&self, id: &AlertInstanceId) -> StorageResult<Option<AlertInstance>> {
        self.get(ALERT_INSTANCES, id.key()).await
    }

    async fn save_alert_instance(&self, instance: &AlertInstance) -> StorageResult<()> {
        self.put(ALERT_INSTANCES, instance.id.key(), instance).await
    }

    async fn list_alert_instances(
        &self,
        rule_id: Option<&AlertRuleId>,
    ) -> StorageResult<Vec<AlertInstance>> {
        let mut instances: Vec<AlertInstance> = self
            .scan(ALERT_INSTANCES)
            .await?
            .into_iter()
            .filter(|i: &AlertInstance| rule_id.is_none_or(|id| i.rule_id == *id))
            .collect();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn create_active_instance(&self, instance: &AlertInstance) -> StorageResult<bool> {
        let rule_id = instance.rule_id;
        let key = instance.id.key();
        let bytes = serde_json::to_vec(instance)?;

        // redb serializes write transactions, so scan-then-insert is atomic
        self.blocking(move |db| {
            let txn = db.begin_write()?;
            let created = {
                let mut table = txn.open_table(ALERT_INSTANCES)?;
                let mut blocked = false;
                for entry in table.iter()? {
                    let (_, value) = entry?;
                    let existing: AlertInstance = serde_json::from_slice(value.value())?;
                    if existing.rule_id == rule_id && existing.is_active() {
                        blocked = true;
                        break;
                    }
                }
                if !blocked {
                    table.insert(key.as_str(), bytes.as_slice())?;
                }
                !blocked
            };
            txn.commit()?;
            Ok(created)
        })
        .await
    }
}
