//! docs-monitor binary entrypoint.
//! Parses the CLI, loads `.env` + config, runs one command and maps the
//! outcome to the exit code.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use docs_monitor::app::{self, Command};
use docs_monitor::config::ENV_CONFIG_PATH;
use docs_monitor::telemetry::{self, Metrics};

#[derive(Parser, Debug)]
#[command(version, about = "Watch documentation feeds and pages for changes")]
struct Cli {
    /// TOML config file. Defaults to $MONITOR_CONFIG_PATH, then config/monitor.toml.
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG_PATH)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Fetch, detect, classify and write the report.
    Run {
        /// Skip the classifier; changes are reported unclassified.
        #[arg(long, default_value_t = false)]
        no_classify: bool,
    },
    /// Fetch and detect only; updates snapshots, writes no report.
    Check,
    /// Rebuild a report from the newest change history record.
    Report {
        #[arg(long, default_value_t = false)]
        no_classify: bool,
    },
}

impl From<CliCommand> for Command {
    fn from(c: CliCommand) -> Self {
        match c {
            CliCommand::Run { no_classify } => Command::Run {
                classify: !no_classify,
            },
            CliCommand::Check => Command::Check,
            CliCommand::Report { no_classify } => Command::Report {
                classify: !no_classify,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    telemetry::init_tracing();
    let metrics = match Metrics::init_from_env() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let cfg = match app::load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(stage = "config", error = ?e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let code = match app::execute(&cfg, cli.command.into()).await {
        Ok(outcome) => {
            if let Some(report) = &outcome.report {
                println!("{report}");
            }
            tracing::info!(changes = outcome.changes.len(), "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(stage = "run", error = ?e, "monitoring run failed");
            ExitCode::FAILURE
        }
    };

    if let Some(m) = metrics {
        if let Err(e) = m.flush() {
            tracing::warn!(error = ?e, "writing metrics textfile failed");
        }
    }
    code
}
