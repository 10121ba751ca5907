// src/telemetry.rs
//! Logging and metrics setup for the binary.
//!
//! Logs go to stderr (compact by default, JSON with `MONITOR_LOG_FORMAT=json`).
//! Metrics are recorded into a Prometheus recorder and, when
//! `MONITOR_METRICS_TEXTFILE` is set, rendered to that file at the end of a run
//! so a node-exporter textfile collector can pick them up.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "MONITOR_LOG_FORMAT";
pub const ENV_METRICS_TEXTFILE: &str = "MONITOR_METRICS_TEXTFILE";
pub const DEFAULT_LOG_FILTER: &str = "docs_monitor=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Calling it twice is harmless (the second install is ignored).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub struct Metrics {
    handle: PrometheusHandle,
    textfile: Option<PathBuf>,
}

impl Metrics {
    /// Install the Prometheus recorder. Only when a textfile target is configured;
    /// otherwise metric calls go to the no-op recorder.
    pub fn init_from_env() -> Result<Option<Self>> {
        let Some(textfile) = std::env::var(ENV_METRICS_TEXTFILE)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Some(Self {
            handle,
            textfile: Some(PathBuf::from(textfile)),
        }))
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition text next to the target, then rename over it.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.textfile else {
            return Ok(());
        };
        write_textfile(path, &self.render())
    }
}

fn write_textfile(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming onto {}", path.display()))?;
    Ok(())
}
