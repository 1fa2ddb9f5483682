//! Execution orchestrator.

use futures::FutureExt;
use prism_core::{Clock, ExecutionId, ReportId, SystemClock};
use prism_query::{QueryExecutor, QueryInput};
use prism_render::{Artifact, OutputRenderer, VisualizationBuilder};
use prism_storage::{Execution, QueryConfig, ReportDefinition, Repository, TriggerType};
use prism_transform::transform;
use serde_json::{Value, json};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Query inputs of a report or widget query config
#[must_use]
pub fn query_input(config: &QueryConfig) -> QueryInput {
    QueryInput {
        query: config.query.clone(),
        params: config.parameters.clone(),
        filters: config.filters.clone(),
    }
}

/// Handle to a triggered execution
///
/// Holds the execution as it was when `trigger` returned. For a run that is
/// still in flight, [`ExecutionHandle::wait`] awaits the background task and
/// yields the final record.
#[derive(Debug)]
pub struct ExecutionHandle {
    execution: Execution,
    task: Option<JoinHandle<Execution>>,
}

impl ExecutionHandle {
    fn ready(execution: Execution) -> Self {
        Self {
            execution,
            task: None,
        }
    }

    /// Execution id
    #[must_use]
    pub fn id(&self) -> ExecutionId {
        self.execution.id
    }

    /// Snapshot taken when the trigger returned
    #[must_use]
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Whether the background task (if any) has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Await the background task and return the final execution
    ///
    /// # Errors
    ///
    /// Returns `Task` if the background task was aborted
    pub async fn wait(self) -> EngineResult<Execution> {
        match self.task {
            Some(task) => task.await.map_err(|e| EngineError::Task(e.to_string())),
            None => Ok(self.execution),
        }
    }
}

struct PipelineOutput {
    payload: Value,
    artifacts: Vec<Artifact>,
}

/// Runs reports: cache check, then query, transform, visualize, render
///
/// Cheap to clone; clones share the repository, connectors, and store.
#[derive(Clone)]
pub struct ReportEngine {
    repo: Arc<dyn Repository>,
    executor: QueryExecutor,
    builder: VisualizationBuilder,
    renderer: OutputRenderer,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl ReportEngine {
    /// Create an engine on the system clock
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        executor: QueryExecutor,
        renderer: OutputRenderer,
        config: EngineConfig,
    ) -> Self {
        let builder = match config.max_chart_points {
            0 => VisualizationBuilder::new(),
            max => VisualizationBuilder::new().with_max_points(max),
        };
        Self {
            repo,
            executor,
            builder,
            renderer,
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

    /// The repository
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// The engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub(crate) fn builder(&self) -> &VisualizationBuilder {
        &self.builder
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Trigger a report
    ///
    /// Serves a valid cache as a `cached` execution with zero duration.
    /// Otherwise records a new execution, moves it to `Running`, and spawns
    /// the pipeline in the background. Pipeline failures end up on the
    /// execution as `Failed`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown report, `Validation` for a malformed
    /// definition, `Storage` if the execution cannot be recorded
    pub async fn trigger(&self, report_id: &ReportId, trigger: TriggerType) -> EngineResult<ExecutionHandle> {
        let report = self
            .repo
            .get_report(report_id)
            .await?
            .ok_or_else(|| EngineError::not_found("report", report_id))?;
        report.validate()?;

        let now = self.clock.now();
        if let Some(payload) = report.cache.fresh_payload(now) {
            let execution = Execution::cached(report.id, payload.clone(), now);
            self.repo.save_execution(&execution).await?;
            info!(report = %report.id, execution = %execution.id, "served report from cache");
            return Ok(ExecutionHandle::ready(execution));
        }

        let mut execution = Execution::queued(report.id, trigger, now);
        self.repo.save_execution(&execution).await?;
        execution.start(self.clock.now())?;
        self.repo.save_execution(&execution).await?;
        info!(report = %report.id, execution = %execution.id, %trigger, "execution started");

        let engine = self.clone();
        let task = tokio::spawn(engine.run_execution(report, execution.clone()));
        let handle = ExecutionHandle {
            execution,
            task: Some(task),
        };

        if self.config.await_completion {
            let finished = handle.wait().await?;
            return Ok(ExecutionHandle::ready(finished));
        }
        Ok(handle)
    }

    /// Trigger and wait for the final execution
    ///
    /// # Errors
    ///
    /// Same as [`ReportEngine::trigger`]
    pub async fn run(&self, report_id: &ReportId, trigger: TriggerType) -> EngineResult<Execution> {
        self.trigger(report_id, trigger).await?.wait().await
    }

    async fn run_execution(self, report: ReportDefinition, mut execution: Execution) -> Execution {
        let outcome = AssertUnwindSafe(self.run_pipeline(&report, &execution.id))
            .catch_unwind()
            .await;
        let now = self.clock.now();

        let result = match outcome {
            Ok(Ok(output)) => {
                let payload = output.payload.clone();
                match execution.complete(output.payload, output.artifacts, now) {
                    Ok(()) => Some(payload),
                    Err(e) => {
                        error!(execution = %execution.id, error = %e, "could not complete execution");
                        None
                    }
                }
            }
            Ok(Err(e)) => {
                self.record_failure(&mut execution, e.to_string(), now);
                None
            }
            Err(panic) => {
                let failure = EngineError::ExecutionFailure(panic_message(panic.as_ref()));
                self.record_failure(&mut execution, failure.to_string(), now);
                None
            }
        };

        if let Err(e) = self.repo.save_execution(&execution).await {
            error!(execution = %execution.id, error = %e, "failed to persist execution");
        }

        if let Some(payload) = result {
            self.refresh_cache(&report.id, payload).await;
            info!(
                report = %report.id,
                execution = %execution.id,
                duration_ms = execution.duration_ms.unwrap_or_default(),
                "execution completed"
            );
        }
        execution
    }

    fn record_failure(&self, execution: &mut Execution, message: String, now: chrono::DateTime<chrono::Utc>) {
        warn!(execution = %execution.id, error = %message, "execution failed");
        if let Err(e) = execution.fail(message, now) {
            error!(execution = %execution.id, error = %e, "could not mark execution failed");
        }
    }

    async fn refresh_cache(&self, report_id: &ReportId, payload: Value) {
        // Re-read so config edits made during the run are kept
        let mut report = match self.repo.get_report(report_id).await {
            Ok(Some(report)) => report,
            Ok(None) => {
                warn!(report = %report_id, "report removed during execution, cache not written");
                return;
            }
            Err(e) => {
                warn!(report = %report_id, error = %e, "could not reload report for cache write");
                return;
            }
        };

        report.cache.store(payload, self.clock.now());
        if let Err(e) = self.repo.save_report(&report).await {
            warn!(report = %report_id, error = %e, "failed to write report cache");
        }
    }

    async fn run_pipeline(
        &self,
        report: &ReportDefinition,
        execution_id: &ExecutionId,
    ) -> EngineResult<PipelineOutput> {
        let input = query_input(&report.query_config);
        let rows = self.executor.execute_all(&report.data_sources, &input).await?;
        debug!(execution = %execution_id, rows = rows.len(), "query stage done");

        let rows = transform(rows, &report.query_config.transformations);
        debug!(execution = %execution_id, rows = rows.len(), "transform stage done");

        let charts = self.builder.build(&rows, &report.visualization_config.charts);
        debug!(execution = %execution_id, charts = charts.len(), "visualization stage done");

        let artifacts = self
            .renderer
            .render_all(&rows, &charts, &report.output_formats, execution_id)
            .await?;
        debug!(execution = %execution_id, artifacts = artifacts.len(), "render stage done");

        let payload = json!({
            "row_count": rows.len(),
            "data": rows,
            "visualizations": charts,
        });
        Ok(PipelineOutput { payload, artifacts })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
