//! Dashboard loading and per-widget refresh.
//!
//! Widgets share the report pipeline up to the visualization stage but keep
//! their own cache and never render artifacts.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use prism_core::{DashboardId, WidgetId};
use prism_storage::{Widget, WidgetPosition};
use prism_transform::transform;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::{ReportEngine, query_input};
use crate::error::{EngineError, EngineResult};

/// One widget as shown on a loaded dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    /// Widget id
    pub widget_id: WidgetId,
    /// Display title
    pub title: String,
    /// Grid placement
    pub position: WidgetPosition,
    /// Chart payload, absent when the refresh failed
    pub chart: Option<Value>,
    /// Served from the widget cache
    pub from_cache: bool,
    /// Refresh failure
    pub error: Option<String>,
}

impl WidgetView {
    fn failed(widget_id: WidgetId, title: String, position: WidgetPosition, error: String) -> Self {
        Self {
            widget_id,
            title,
            position,
            chart: None,
            from_cache: false,
            error: Some(error),
        }
    }
}

/// A dashboard with every widget refreshed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Dashboard id
    pub dashboard_id: DashboardId,
    /// Display name
    pub name: String,
    /// Widgets in dashboard order
    pub widgets: Vec<WidgetView>,
    /// When the view was assembled
    pub loaded_at: DateTime<Utc>,
}

impl DashboardView {
    /// Widgets whose refresh failed
    pub fn failed_widgets(&self) -> impl Iterator<Item = &WidgetView> {
        self.widgets.iter().filter(|w| w.error.is_some())
    }
}

/// Refreshes dashboard widgets through the engine's connectors
#[derive(Clone)]
pub struct DashboardService {
    engine: ReportEngine,
}

impl DashboardService {
    /// Create a service sharing `engine`'s repository, executor, and clock
    #[must_use]
    pub fn new(engine: ReportEngine) -> Self {
        Self { engine }
    }

    /// Refresh one widget
    ///
    /// A valid widget cache is returned as is. Otherwise the widget's query
    /// runs, its transforms apply, its chart is built, and the chart payload
    /// is written to the widget cache.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown widget, `Validation` for a malformed one,
    /// and query or storage errors from the refresh itself
    pub async fn refresh_widget(&self, widget_id: &WidgetId) -> EngineResult<WidgetView> {
        let repo = self.engine.repository();
        let widget = repo
            .get_widget(widget_id)
            .await?
            .ok_or_else(|| EngineError::not_found("widget", widget_id))?;
        widget.validate()?;

        if let Some(payload) = widget.cache.fresh_payload(self.engine.now()) {
            debug!(widget = %widget.id, "widget served from cache");
            return Ok(view(&widget, payload.clone(), true));
        }

        let chart = self.build_chart(&widget).await?;

        // Re-read so edits made during the refresh are kept
        let mut latest = repo.get_widget(widget_id).await?.unwrap_or(widget);
        latest.cache.store(chart.clone(), self.engine.now());
        repo.save_widget(&latest).await?;

        debug!(widget = %latest.id, "widget refreshed");
        Ok(view(&latest, chart, false))
    }

    async fn build_chart(&self, widget: &Widget) -> EngineResult<Value> {
        let input = query_input(&widget.query_config);
        let rows = self
            .engine
            .executor()
            .execute(&widget.data_source, &input)
            .await?;
        let rows = transform(rows, &widget.query_config.transformations);
        let payload = self.engine.builder().build_one(&rows, &widget.chart);
        serde_json::to_value(payload).map_err(|e| EngineError::ExecutionFailure(e.to_string()))
    }

    /// Load a dashboard and refresh all of its widgets concurrently
    ///
    /// Widgets appear in the dashboard's declared order, followed by any
    /// widget of the dashboard that the order omits. A widget that fails to
    /// refresh carries its error in the view; the dashboard still loads.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown dashboard, storage errors listing widgets
    pub async fn load_dashboard(&self, dashboard_id: &DashboardId) -> EngineResult<DashboardView> {
        let repo = self.engine.repository();
        let dashboard = repo
            .get_dashboard(dashboard_id)
            .await?
            .ok_or_else(|| EngineError::not_found("dashboard", dashboard_id))?;

        let mut stored = repo.list_widgets(dashboard_id).await?;
        let mut ordered: Vec<(WidgetId, Option<Widget>)> = Vec::new();
        for id in &dashboard.widget_ids {
            let widget = stored
                .iter()
                .position(|w| w.id == *id)
                .map(|idx| stored.remove(idx));
            ordered.push((*id, widget));
        }
        ordered.extend(stored.into_iter().map(|w| (w.id, Some(w))));

        let refreshes = ordered.into_iter().map(|(id, widget)| async move {
            let Some(widget) = widget else {
                warn!(dashboard = %dashboard_id, widget = %id, "dashboard references missing widget");
                return WidgetView::failed(
                    id,
                    String::new(),
                    WidgetPosition::default(),
                    EngineError::not_found("widget", id).to_string(),
                );
            };
            match self.refresh_widget(&id).await {
                Ok(view) => view,
                Err(e) => {
                    warn!(dashboard = %dashboard_id, widget = %id, error = %e, "widget refresh failed");
                    WidgetView::failed(id, widget.title, widget.position, e.to_string())
                }
            }
        });
        let widgets = join_all(refreshes).await;

        let view = DashboardView {
            dashboard_id: dashboard.id,
            name: dashboard.name,
            widgets,
            loaded_at: self.engine.now(),
        };
        info!(
            dashboard = %view.dashboard_id,
            widgets = view.widgets.len(),
            failed = view.failed_widgets().count(),
            "dashboard loaded"
        );
        Ok(view)
    }
}

fn view(widget: &Widget, chart: Value, from_cache: bool) -> WidgetView {
    WidgetView {
        widget_id: widget.id,
        title: widget.title.clone(),
        position: widget.position,
        chart: Some(chart),
        from_cache,
        error: None,
    }
}
