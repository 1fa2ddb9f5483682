//! Wiring of the engine, dashboards, and alert evaluator from config.

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use prism_alert::{AlertEvaluator, AlertScheduler, HttpNotifier, NotificationDispatcher};
use prism_query::{FsDatasetCatalog, HttpApiConnector, QueryExecutor};
use prism_render::{FsArtifactStore, OutputRenderer};
use prism_runtime::{DashboardService, ReportEngine, ReportScheduler};
use prism_storage::{RedbRepository, Repository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::config::CliConfig;

/// Everything a command needs
pub struct App {
    pub repo: Arc<dyn Repository>,
    pub engine: ReportEngine,
    pub dashboards: DashboardService,
    pub alerts: AlertEvaluator,
}

impl App {
    /// Open storage and build the services
    pub async fn build(config: &CliConfig) -> Result<Self> {
        let repo: Arc<dyn Repository> = Arc::new(
            RedbRepository::open(&config.database_path)
                .wrap_err_with(|| format!("cannot open {}", config.database_path.display()))?,
        );

        // No relational driver ships with the binary
        let api = HttpApiConnector::new(Duration::from_secs(config.http_timeout_secs))?;
        let executor = QueryExecutor::new(Arc::new(FsDatasetCatalog::new(&config.datasets_dir)))
            .with_api(Arc::new(api));

        let store = FsArtifactStore::open(&config.output_dir)
            .await
            .wrap_err_with(|| format!("cannot open {}", config.output_dir.display()))?;
        let renderer = OutputRenderer::new(Arc::new(store));

        let engine = ReportEngine::new(repo.clone(), executor.clone(), renderer, config.engine.clone());
        let dashboards = DashboardService::new(engine.clone());

        let notifier = HttpNotifier::new(Duration::from_secs(config.alerts.notify_timeout_secs))?;
        let alerts = AlertEvaluator::new(
            repo.clone(),
            executor,
            NotificationDispatcher::new(Arc::new(notifier)),
            config.alerts.clone(),
        );

        Ok(Self {
            repo,
            engine,
            dashboards,
            alerts,
        })
    }

    /// Run both schedulers until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let (tx, rx) = watch::channel(false);
        let reports = tokio::spawn(ReportScheduler::new(self.engine.clone()).run(rx.clone()));
        let alerts = tokio::spawn(AlertScheduler::new(self.alerts.clone()).run(rx));
        info!("serving; press Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        info!("shutting down");
        tx.send(true)?;
        reports.await?;
        alerts.await?;
        Ok(())
    }
}
