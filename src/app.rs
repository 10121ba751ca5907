// src/app.rs
//! Wires config into concrete fetcher / classifier / store and runs one command.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{build_classifier, DisabledClassifier, DynClassifier};
use crate::config::{self, MonitorConfig};
use crate::fetch::HttpFetcher;
use crate::pipeline::{Monitor, RunMode, RunOutcome};
use crate::store::{FileStore, ReportDir, RunLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run { classify: bool },
    Check,
    Report { classify: bool },
}

impl Command {
    fn wants_classifier(self) -> bool {
        match self {
            Command::Run { classify } | Command::Report { classify } => classify,
            Command::Check => false,
        }
    }
}

/// Explicit path wins; otherwise env var + fallbacks.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(p) => config::load_from(p),
        None => config::load_default(),
    }
}

/// A classifier that cannot be built (typically a missing API key) does not
/// abort the run: every change then gets the unclassified placeholder.
fn classifier_for(cfg: &MonitorConfig, wanted: bool) -> DynClassifier {
    if !wanted {
        return Arc::new(DisabledClassifier);
    }
    match build_classifier(&cfg.classifier) {
        Ok(c) => {
            tracing::info!(
                provider = c.provider_name(),
                model = %cfg.classifier.model,
                "classifier ready"
            );
            c
        }
        Err(e) => {
            tracing::warn!(error = ?e, "classifier unavailable, changes stay unclassified");
            Arc::new(DisabledClassifier)
        }
    }
}

pub async fn execute(cfg: &MonitorConfig, command: Command) -> Result<RunOutcome> {
    let catalog = cfg.catalog()?;
    let _lock = RunLock::acquire(&cfg.data_dir)?;

    let store = FileStore::new(&cfg.data_dir);
    let reports = ReportDir::new(&cfg.reports_dir);
    let fetcher = HttpFetcher::new(&cfg.fetch).context("building HTTP client")?;
    let classifier = classifier_for(cfg, command.wants_classifier());

    let monitor = Monitor {
        catalog: &catalog,
        fetcher: &fetcher,
        classifier: classifier.as_ref(),
        store: &store,
        reports: &reports,
        report: &cfg.report,
        delay: Duration::from_millis(cfg.fetch.delay_ms),
    };

    let now = Utc::now();
    tracing::info!(
        ?command,
        sources = catalog.len(),
        data_dir = %cfg.data_dir.display(),
        "starting"
    );
    match command {
        Command::Run { .. } => monitor.run_once(now, RunMode::Full).await,
        Command::Check => monitor.run_once(now, RunMode::CheckOnly).await,
        Command::Report { .. } => monitor.report_from_history(now).await,
    }
}
