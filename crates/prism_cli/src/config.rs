//! Configuration file.

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use prism_alert::AlertConfig;
use prism_runtime::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `prism.json`; every field is optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// redb database file
    pub database_path: PathBuf,
    /// Directory receiving rendered artifacts
    pub output_dir: PathBuf,
    /// Directory holding `<dataset_id>.json` files
    pub datasets_dir: PathBuf,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Timeout for external API sources, in seconds
    pub http_timeout_secs: u64,
    /// Report engine settings
    pub engine: EngineConfig,
    /// Alert loop settings
    pub alerts: AlertConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("prism.redb"),
            output_dir: PathBuf::from("artifacts"),
            datasets_dir: PathBuf::from("datasets"),
            log_filter: "prism=info".to_string(),
            http_timeout_secs: 30,
            engine: EngineConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("cannot read config {}", path.display()));
            }
        };
        serde_json::from_str(&text).wrap_err_with(|| format!("invalid config {}", path.display()))
    }
}
