//! Interval scheduler for reports.
//!
//! Each tick lists reports, triggers every report whose schedule is due with
//! `trigger_type = scheduled`, and stamps `last_scheduled_at`. One report
//! failing to trigger never stops the tick.

use prism_core::ExecutionId;
use prism_storage::TriggerType;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::ReportEngine;
use crate::error::EngineResult;

/// Triggers due reports on a fixed tick
#[derive(Clone)]
pub struct ReportScheduler {
    engine: ReportEngine,
    tick: Duration,
}

impl ReportScheduler {
    /// Create a scheduler ticking every `engine.config().scheduler_tick_secs`
    #[must_use]
    pub fn new(engine: ReportEngine) -> Self {
        let tick = Duration::from_secs(engine.config().scheduler_tick_secs.max(1));
        Self { engine, tick }
    }

    /// Override the tick interval
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run one scheduling pass
    ///
    /// Returns the executions started (or served from cache) by this pass.
    ///
    /// # Errors
    ///
    /// Returns error only if the report list cannot be read
    pub async fn tick(&self) -> EngineResult<Vec<ExecutionId>> {
        let now = self.engine.now();
        let repo = self.engine.repository();
        let mut triggered = Vec::new();

        for listed in repo.list_reports().await? {
            if !listed.is_schedule_due(now) {
                continue;
            }

            // Stamp the stored record, not the listed snapshot, so writes made
            // since the listing (cache refreshes, edits) survive
            let mut report = match repo.get_report(&listed.id).await {
                Ok(Some(report)) if report.is_schedule_due(now) => report,
                Ok(_) => continue,
                Err(e) => {
                    warn!(report = %listed.id, error = %e, "could not reload report, skipping");
                    continue;
                }
            };
            report.last_scheduled_at = Some(now);
            if let Err(e) = repo.save_report(&report).await {
                warn!(report = %report.id, error = %e, "could not stamp schedule, skipping");
                continue;
            }

            match self.engine.trigger(&report.id, TriggerType::Scheduled).await {
                Ok(handle) => {
                    debug!(report = %report.id, execution = %handle.id(), "scheduled trigger");
                    triggered.push(handle.id());
                }
                Err(e) => warn!(report = %report.id, error = %e, "scheduled trigger failed"),
            }
        }

        if !triggered.is_empty() {
            info!(count = triggered.len(), "report scheduler tick");
        }
        Ok(triggered)
    }

    /// Tick until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick_secs = self.tick.as_secs(), "report scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "report scheduler tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("report scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use async_trait::async_trait;
    use prism_core::record::records_from_json;
    use prism_core::{
        AlertInstanceId, AlertRuleId, Clock, DashboardId, ManualClock, ReportId, SourceDescriptor,
        WidgetId,
    };
    use prism_query::{MemoryDatasetCatalog, QueryExecutor};
    use prism_render::{MemoryArtifactStore, OutputRenderer};
    use prism_storage::{
        AlertInstance, AlertRule, Dashboard, Execution, MemoryRepository, ReportDefinition,
        Repository, StorageResult, Widget,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn scheduler() -> (Arc<MemoryRepository>, Arc<ManualClock>, ReportScheduler) {
        let repo = Arc::new(MemoryRepository::new());
        let catalog = Arc::new(MemoryDatasetCatalog::new());
        catalog
            .insert("kpi", records_from_json(json!([{"v": 1}])))
            .await;
        let clock = Arc::new(ManualClock::default());
        let engine = ReportEngine::new(
            repo.clone(),
            QueryExecutor::new(catalog),
            OutputRenderer::new(Arc::new(MemoryArtifactStore::new())),
            EngineConfig::default().with_await_completion(true),
        )
        .with_clock(clock.clone());
        (repo, clock, ReportScheduler::new(engine))
    }

    #[tokio::test]
    async fn test_tick_triggers_due_reports_once_per_interval() {
        let (repo, clock, scheduler) = scheduler().await;
        let scheduled = ReportDefinition::new("hourly")
            .with_source(SourceDescriptor::dataset("kpi", "kpi"))
            .with_cache_ttl(0)
            .with_schedule(60);
        let manual = ReportDefinition::new("manual").with_source(SourceDescriptor::dataset("kpi", "kpi"));
        repo.save_report(&scheduled).await.unwrap();
        repo.save_report(&manual).await.unwrap();

        let first = scheduler.tick().await.unwrap();
        assert_eq!(first.len(), 1);
        let execution = repo.get_execution(&first[0]).await.unwrap().unwrap();
        assert_eq!(execution.trigger_type, TriggerType::Scheduled);
        assert_eq!(execution.report_id, scheduled.id);

        clock.advance_minutes(30);
        assert!(scheduler.tick().await.unwrap().is_empty());

        clock.advance_minutes(30);
        assert_eq!(scheduler.tick().await.unwrap().len(), 1);
        assert_eq!(repo.list_executions(&scheduled.id).await.unwrap().len(), 2);
        assert!(repo.list_executions(&manual.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_report_does_not_stop_tick() {
        let (repo, _clock, scheduler) = scheduler().await;
        let mut broken = ReportDefinition::new("broken").with_schedule(5);
        broken.data_sources.clear();
        let fine = ReportDefinition::new("fine")
            .with_source(SourceDescriptor::dataset("kpi", "kpi"))
            .with_schedule(5);
        repo.save_report(&broken).await.unwrap();
        repo.save_report(&fine).await.unwrap();

        let triggered = scheduler.tick().await.unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(repo.list_executions(&fine.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (_repo, _clock, scheduler) = scheduler().await;
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(scheduler.with_tick(Duration::from_millis(10)).run(rx));
        tx.send(true).unwrap();
        task.await.unwrap();
    }

    /// Memory repository that edits and caches every report right after the
    /// first listing, the way a concurrent writer would
    struct WriteAfterListRepo {
        inner: MemoryRepository,
        clock: Arc<ManualClock>,
        fired: AtomicBool,
    }

    #[async_trait]
    impl Repository for WriteAfterListRepo {
        async fn get_report(&self, id: &ReportId) -> StorageResult<Option<ReportDefinition>> {
            self.inner.get_report(id).await
        }
        async fn save_report(&self, report: &ReportDefinition) -> StorageResult<()> {
            self.inner.save_report(report).await
        }
        async fn list_reports(&self) -> StorageResult<Vec<ReportDefinition>> {
            let snapshot = self.inner.list_reports().await?;
            if !self.fired.swap(true, Ordering::SeqCst) {
                for listed in &snapshot {
                    let mut report = listed.clone();
                    report
                        .query_config
                        .filters
                        .insert("region".to_string(), json!("east"));
                    report.cache.store(json!({"row_count": 1}), self.clock.now());
                    self.inner.save_report(&report).await?;
                }
            }
            Ok(snapshot)
        }
        async fn get_execution(&self, id: &ExecutionId) -> StorageResult<Option<Execution>> {
            self.inner.get_execution(id).await
        }
        async fn save_execution(&self, execution: &Execution) -> StorageResult<()> {
            self.inner.save_execution(execution).await
        }
        async fn list_executions(&self, report_id: &ReportId) -> StorageResult<Vec<Execution>> {
            self.inner.list_executions(report_id).await
        }
        async fn get_dashboard(&self, id: &DashboardId) -> StorageResult<Option<Dashboard>> {
            self.inner.get_dashboard(id).await
        }
        async fn save_dashboard(&self, dashboard: &Dashboard) -> StorageResult<()> {
            self.inner.save_dashboard(dashboard).await
        }
        async fn list_dashboards(&self) -> StorageResult<Vec<Dashboard>> {
            self.inner.list_dashboards().await
        }
        async fn get_widget(&self, id: &WidgetId) -> StorageResult<Option<Widget>> {
            self.inner.get_widget(id).await
        }
        async fn save_widget(&self, widget: &Widget) -> StorageResult<()> {
            self.inner.save_widget(widget).await
        }
        async fn list_widgets(&self, dashboard_id: &DashboardId) -> StorageResult<Vec<Widget>> {
            self.inner.list_widgets(dashboard_id).await
        }
        async fn get_alert_rule(&self, id: &AlertRuleId) -> StorageResult<Option<AlertRule>> {
            self.inner.get_alert_rule(id).await
        }
        async fn save_alert_rule(&self, rule: &AlertRule) -> StorageResult<()> {
            self.inner.save_alert_rule(rule).await
        }
        async fn list_alert_rules(&self) -> StorageResult<Vec<AlertRule>> {
            self.inner.list_alert_rules().await
        }
        async fn get_alert_instance(&self, id: &AlertInstanceId) -> StorageResult<Option<AlertInstance>> {
            self.inner.get_alert_instance(id).await
        }
        async fn save_alert_instance(&self, instance: &AlertInstance) -> StorageResult<()> {
            self.inner.save_alert_instance(instance).await
        }
        async fn list_alert_instances(&self, rule_id: Option<&AlertRuleId>) -> StorageResult<Vec<AlertInstance>> {
            self.inner.list_alert_instances(rule_id).await
        }
        async fn create_active_instance(&self, instance: &AlertInstance) -> StorageResult<bool> {
            self.inner.create_active_instance(instance).await
        }
    }

    #[tokio::test]
    async fn test_tick_keeps_writes_made_after_listing() {
        let clock = Arc::new(ManualClock::default());
        let repo = Arc::new(WriteAfterListRepo {
            inner: MemoryRepository::new(),
            clock: clock.clone(),
            fired: AtomicBool::new(false),
        });
        let catalog = Arc::new(MemoryDatasetCatalog::new());
        catalog
            .insert("kpi", records_from_json(json!([{"v": 1}])))
            .await;
        let engine = ReportEngine::new(
            repo.clone(),
            QueryExecutor::new(catalog),
            OutputRenderer::new(Arc::new(MemoryArtifactStore::new())),
            EngineConfig::default().with_await_completion(true),
        )
        .with_clock(clock.clone());
        let scheduler = ReportScheduler::new(engine);

        let report = ReportDefinition::new("hourly")
            .with_source(SourceDescriptor::dataset("kpi", "kpi"))
            .with_cache_ttl(60)
            .with_schedule(60);
        repo.save_report(&report).await.unwrap();

        let triggered = scheduler.tick().await.unwrap();
        assert_eq!(triggered.len(), 1);
        let execution = repo.get_execution(&triggered[0]).await.unwrap().unwrap();
        assert_eq!(execution.trigger_type, TriggerType::Cached);

        let stored = repo.get_report(&report.id).await.unwrap().unwrap();
        assert_eq!(stored.query_config.filters.get("region"), Some(&json!("east")));
        assert!(stored.cache.payload.is_some());
        assert_eq!(stored.last_scheduled_at, Some(clock.now()));
    }
}
