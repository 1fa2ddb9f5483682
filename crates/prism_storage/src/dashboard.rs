//! Dashboards and their independently cached widgets.

use prism_core::{CacheState, CoreError, CoreResult, DashboardId, SourceDescriptor, WidgetId};
use prism_render::ChartSpec;
use serde::{Deserialize, Serialize};

use crate::report::QueryConfig;

/// An ordered collection of widgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Dashboard id
    #[serde(default)]
    pub id: DashboardId,
    /// Display name
    pub name: String,
    /// Widgets in display order
    #[serde(default)]
    pub widget_ids: Vec<WidgetId>,
}

impl Dashboard {
    /// Create an empty dashboard
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DashboardId::new(),
            name: name.into(),
            widget_ids: Vec::new(),
        }
    }
}

/// Grid placement of a widget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPosition {
    /// Column
    pub x: u32,
    /// Row
    pub y: u32,
    /// Width in grid cells
    pub width: u32,
    /// Height in grid cells
    pub height: u32,
}

/// One visualization on a dashboard, with its own cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    /// Widget id
    #[serde(default)]
    pub id: WidgetId,
    /// Owning dashboard
    pub dashboard_id: DashboardId,
    /// Display title
    pub title: String,
    /// Grid placement
    #[serde(default)]
    pub position: WidgetPosition,
    /// Source queried on refresh
    pub data_source: SourceDescriptor,
    /// Query text, params, filters, transforms
    #[serde(default)]
    pub query_config: QueryConfig,
    /// Chart to build
    pub chart: ChartSpec,
    /// Cached chart payload
    #[serde(default)]
    pub cache: CacheState,
}

impl Widget {
    /// Create a widget on `dashboard_id`
    #[must_use]
    pub fn new(
        dashboard_id: DashboardId,
        title: impl Into<String>,
        data_source: SourceDescriptor,
        chart: ChartSpec,
    ) -> Self {
        Self {
            id: WidgetId::new(),
            dashboard_id,
            title: title.into(),
            position: WidgetPosition::default(),
            data_source,
            query_config: QueryConfig::default(),
            chart,
            cache: CacheState::default(),
        }
    }

    /// Set the cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl_minutes: u32) -> Self {
        self.cache.ttl_minutes = ttl_minutes;
        self
    }

    /// Check the widget definition
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field
    pub fn validate(&self) -> CoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        self.data_source.validate(self.query_config.query.as_deref())
    }
}
