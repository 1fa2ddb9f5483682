//! Prism CLI
//!
//! Imports definitions, runs reports, loads dashboards, and drives the
//! report and alert schedulers.

#![warn(clippy::all)]

mod app;
mod config;
mod import;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use prism_core::{AlertInstanceId, AlertRuleId, DashboardId, ReportId};
use prism_storage::TriggerType;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::CliConfig;
use crate::import::Definitions;

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Prism - report execution, caching, and alerting engine", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "prism.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import reports, dashboards, widgets, and alert rules
    Import {
        /// Definitions file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List reports
    Reports,
    /// Run a report and wait for the result
    Run {
        /// Report id
        #[arg(short, long)]
        report: ReportId,
    },
    /// Execution history of a report, newest first
    Executions {
        /// Report id
        #[arg(short, long)]
        report: ReportId,
    },
    /// Load a dashboard, refreshing stale widgets
    Dashboard {
        /// Dashboard id
        #[arg(short, long)]
        id: DashboardId,
    },
    /// Alert operations
    Alerts {
        #[command(subcommand)]
        command: AlertCommands,
    },
    /// Run the report and alert schedulers until Ctrl-C
    Serve,
}

#[derive(Subcommand)]
enum AlertCommands {
    /// Evaluate every enabled rule once
    Evaluate,
    /// List alert instances
    List {
        /// Only instances of this rule
        #[arg(short, long)]
        rule: Option<AlertRuleId>,
    },
    /// Acknowledge an active alert
    Ack {
        /// Alert instance id
        #[arg(short, long)]
        id: AlertInstanceId,
        /// Who acknowledges
        #[arg(short, long)]
        by: Option<String>,
    },
    /// Resolve an alert
    Resolve {
        /// Alert instance id
        #[arg(short, long)]
        id: AlertInstanceId,
        /// Resolution reason
        #[arg(short, long, default_value = "resolved manually")]
        reason: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)?;
    init_tracing(&config);

    let app = App::build(&config).await?;

    match cli.command {
        Commands::Import { file } => {
            let summary = Definitions::read(&file)?.import(app.repo.as_ref()).await?;
            print_json(&summary)
        }
        Commands::Reports => print_json(&app.repo.list_reports().await?),
        Commands::Run { report } => {
            let execution = app.engine.run(&report, TriggerType::Manual).await?;
            print_json(&execution)
        }
        Commands::Executions { report } => {
            if app.repo.get_report(&report).await?.is_none() {
                return Err(eyre!("report not found: {}", report));
            }
            print_json(&app.repo.list_executions(&report).await?)
        }
        Commands::Dashboard { id } => print_json(&app.dashboards.load_dashboard(&id).await?),
        Commands::Alerts { command } => match command {
            AlertCommands::Evaluate => print_json(&app.alerts.evaluate_tick().await?),
            AlertCommands::List { rule } => {
                print_json(&app.repo.list_alert_instances(rule.as_ref()).await?)
            }
            AlertCommands::Ack { id, by } => print_json(&app.alerts.acknowledge(&id, by).await?),
            AlertCommands::Resolve { id, reason } => {
                print_json(&app.alerts.resolve(&id, reason).await?)
            }
        },
        Commands::Serve => app.serve().await,
    }
}
