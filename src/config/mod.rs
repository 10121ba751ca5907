// src/config/mod.rs
pub mod classifier;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, Source};
use classifier::ClassifierConfig;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Pause between two source requests.
    pub delay_ms: u64,
    pub max_feed_entries: usize,
    pub summary_chars: usize,
    pub preview_chars: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            delay_ms: 1_000,
            max_feed_entries: 5,
            summary_chars: 500,
            preview_chars: 1_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub links: Vec<ReferenceLink>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let link = |label: &str, url: &str| ReferenceLink {
            label: label.to_string(),
            url: url.to_string(),
        };
        Self {
            title: "Sysdig ドキュメント監視レポート".to_string(),
            links: vec![
                link(
                    "Sysdig Release Notes",
                    "https://docs.sysdig.com/en/release-notes/",
                ),
                link(
                    "Linux Host Shield Release Notes",
                    "https://docs.sysdig.com/en/release-notes/linux-host-shield-release-notes/",
                ),
                link("Deprecation Notice", "https://docs.sysdig.com/en/deprecation/"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Empty means the built-in catalog.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reports_dir: default_reports_dir(),
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
            report: ReportConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl MonitorConfig {
    pub fn catalog(&self) -> Result<Catalog> {
        if self.sources.is_empty() {
            return Ok(Catalog::builtin());
        }
        Catalog::new(self.sources.clone()).context("validating [[sources]]")
    }
}

/// Load config from an explicit TOML path.
pub fn load_from(path: &Path) -> Result<MonitorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading monitor config from {}", path.display()))?;
    parse(&content).with_context(|| format!("parsing monitor config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $MONITOR_CONFIG_PATH
/// 2) config/monitor.toml
/// 3) built-in defaults
pub fn load_default() -> Result<MonitorConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let p = PathBuf::from(DEFAULT_CONFIG_PATH);
    if p.exists() {
        return load_from(&p);
    }
    let mut cfg = MonitorConfig::default();
    cfg.classifier.normalize();
    Ok(cfg)
}

fn parse(s: &str) -> Result<MonitorConfig> {
    let mut cfg: MonitorConfig = toml::from_str(s)?;
    cfg.classifier.normalize();
    for src in cfg.sources.iter_mut() {
        src.id = src.id.trim().to_string();
        src.url = src.url.trim().to_string();
    }
    Ok(cfg)
}
