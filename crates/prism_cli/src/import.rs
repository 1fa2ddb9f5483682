//! Bulk import of definitions from a JSON document.

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use prism_storage::{AlertRule, Dashboard, ReportDefinition, Repository, Widget};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Definitions file layout
///
/// ```json
/// {"reports": [...], "dashboards": [...], "widgets": [...], "alert_rules": [...]}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Definitions {
    /// Report definitions
    pub reports: Vec<ReportDefinition>,
    /// Dashboards
    pub dashboards: Vec<Dashboard>,
    /// Widgets
    pub widgets: Vec<Widget>,
    /// Alert rules
    pub alert_rules: Vec<AlertRule>,
}

/// Counts of stored definitions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Reports stored
    pub reports: usize,
    /// Dashboards stored
    pub dashboards: usize,
    /// Widgets stored
    pub widgets: usize,
    /// Alert rules stored
    pub alert_rules: usize,
}

impl Definitions {
    /// Read a definitions file
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read definitions {}", path.display()))?;
        serde_json::from_str(&text)
            .wrap_err_with(|| format!("invalid definitions {}", path.display()))
    }

    /// Check every definition before anything is written
    pub fn validate(&self) -> Result<()> {
        for report in &self.reports {
            report
                .validate()
                .map_err(|e| eyre!("report '{}': {}", report.name, e))?;
        }
        for widget in &self.widgets {
            widget
                .validate()
                .map_err(|e| eyre!("widget '{}': {}", widget.title, e))?;
        }
        for rule in &self.alert_rules {
            rule.validate()
                .map_err(|e| eyre!("alert rule '{}': {}", rule.name, e))?;
        }
        Ok(())
    }

    /// Validate, then upsert everything into `repo`
    pub async fn import(&self, repo: &dyn Repository) -> Result<ImportSummary> {
        self.validate()?;

        for report in &self.reports {
            repo.save_report(report).await?;
        }
        for dashboard in &self.dashboards {
            repo.save_dashboard(dashboard).await?;
        }
        for widget in &self.widgets {
            repo.save_widget(widget).await?;
        }
        for rule in &self.alert_rules {
            repo.save_alert_rule(rule).await?;
        }

        let summary = ImportSummary {
            reports: self.reports.len(),
            dashboards: self.dashboards.len(),
            widgets: self.widgets.len(),
            alert_rules: self.alert_rules.len(),
        };
        info!(?summary, "definitions imported");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_storage::MemoryRepository;
    use serde_json::json;

    fn definitions() -> Definitions {
        serde_json::from_value(json!({
            "reports": [{
                "id": "0b9f4a0e-3f5c-4f0e-9a51-8d0f3c2b7a11",
                "name": "Weekly sales",
                "data_sources": [
                    {"name": "sales", "type": "dataset", "config": {"dataset_id": "sales"}}
                ],
                "output_formats": ["csv"]
            }],
            "dashboards": [{
                "id": "5a4c1f7e-2b1d-4c3e-8f6a-0d9e8c7b6a51",
                "name": "Ops",
                "widget_ids": ["9c2e7d6b-1a3f-4e5d-8c7b-6a5f4e3d2c11"]
            }],
            "widgets": [{
                "id": "9c2e7d6b-1a3f-4e5d-8c7b-6a5f4e3d2c11",
                "dashboard_id": "5a4c1f7e-2b1d-4c3e-8f6a-0d9e8c7b6a51",
                "title": "Errors",
                "data_source": {"name": "errors", "type": "dataset", "config": {"dataset_id": "errors"}},
                "chart": {"name": "errors", "type": "line"}
            }],
            "alert_rules": [{
                "name": "Error rate",
                "data_source": {"name": "errors", "type": "dataset", "config": {"dataset_id": "errors"}},
                "condition": {"threshold_value": 5, "comparison_operator": ">"}
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_import_stores_everything() {
        let repo = MemoryRepository::new();
        let summary = definitions().import(&repo).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                reports: 1,
                dashboards: 1,
                widgets: 1,
                alert_rules: 1
            }
        );
        assert_eq!(repo.list_reports().await.unwrap()[0].name, "Weekly sales");
        assert_eq!(repo.list_alert_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_rule_aborts_import() {
        let repo = MemoryRepository::new();
        let mut defs = definitions();
        defs.alert_rules[0].name = String::new();

        let err = defs.import(&repo).await.unwrap_err();
        assert!(err.to_string().contains("alert rule"));
        assert!(repo.list_reports().await.unwrap().is_empty());
    }
}
