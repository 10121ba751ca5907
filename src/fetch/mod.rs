// src/fetch/mod.rs
pub mod feed;
pub mod fixture;
pub mod http;
pub mod page;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::time::Duration;

use crate::catalog::{Catalog, Source};
use crate::config::FetchConfig;
use crate::snapshot::{Entry, Snapshot};

pub use fixture::FixtureFetcher;
pub use http::HttpFetcher;

/// Retrieves the current entries of one source.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<Entry>>;
    fn name(&self) -> &'static str;
}

/// Limits applied while turning raw feed/page content into entries.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub max_feed_entries: usize,
    pub summary_chars: usize,
    pub preview_chars: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        FetchConfig::default().parse_options()
    }
}

impl FetchConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_feed_entries: self.max_feed_entries,
            summary_chars: self.summary_chars,
            preview_chars: self.preview_chars,
        }
    }
}

/// Per-source result of a fetch cycle, shown in the report's status section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub source: String,
    pub entries: usize,
    /// Latest entry label, if the source produced any.
    pub newest: Option<String>,
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub snapshot: Snapshot,
    pub statuses: Vec<SourceStatus>,
}

impl FetchOutcome {
    pub fn failed(&self) -> usize {
        self.statuses.iter().filter(|s| !s.is_ok()).count()
    }

    pub fn all_failed(&self) -> bool {
        !self.statuses.is_empty() && self.failed() == self.statuses.len()
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_fetch_total", "Sources fetched successfully.");
        describe_counter!(
            "monitor_fetch_errors_total",
            "Source fetch/parse errors (source skipped for the run)."
        );
        describe_counter!("monitor_entries_total", "Entries observed across sources.");
        describe_histogram!("monitor_fetch_ms", "Per-source fetch + parse time in milliseconds.");
    });
}

/// Fetch every catalog source in order.
///
/// A failing source does not abort the cycle: it is logged and its previous
/// entries (if any) are carried into the new snapshot, so it reads as unchanged.
pub async fn fetch_all(
    fetcher: &dyn Fetcher,
    catalog: &Catalog,
    previous: Option<&Snapshot>,
    delay: Duration,
    now: DateTime<Utc>,
) -> FetchOutcome {
    ensure_metrics_described();

    let mut snapshot = Snapshot::new(now);
    let mut statuses = Vec::with_capacity(catalog.len());

    for (i, source) in catalog.sources().iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let t0 = std::time::Instant::now();
        let res = fetcher.fetch(source).await;
        histogram!("monitor_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(entries) => {
                tracing::info!(source = %source.id, kind = %source.kind, entries = entries.len(), "fetched");
                counter!("monitor_fetch_total").increment(1);
                counter!("monitor_entries_total").increment(entries.len() as u64);
                statuses.push(SourceStatus {
                    source: source.id.clone(),
                    entries: entries.len(),
                    newest: entries.first().map(newest_label),
                    error: None,
                });
                snapshot.insert(source.id.clone(), entries);
            }
            Err(e) => {
                tracing::warn!(error = ?e, source = %source.id, fetcher = fetcher.name(), "source fetch failed, skipping");
                counter!("monitor_fetch_errors_total").increment(1);
                statuses.push(SourceStatus {
                    source: source.id.clone(),
                    entries: 0,
                    newest: None,
                    error: Some(format!("{e:#}")),
                });
                if let Some(prior) = previous.and_then(|p| p.entries(&source.id)) {
                    snapshot.insert(source.id.clone(), prior.to_vec());
                }
            }
        }
    }

    FetchOutcome { snapshot, statuses }
}

fn newest_label(e: &Entry) -> String {
    match &e.published {
        Some(p) => format!("{}（{}）", e.label(), p),
        None => e.label().to_string(),
    }
}

/// Decode entities, strip tags, normalize curly quotes and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z!][^>]*>").expect("tag regex"));
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));

    // Tags first: feeds often double-escape markup (&lt;p&gt;), so strip again after decoding.
    let out = re_tags.replace_all(s, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = re_tags.replace_all(&out, " ");

    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    re_ws.replace_all(&out, " ").trim().to_string()
}

/// First `max` chars (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
