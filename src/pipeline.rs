// src/pipeline.rs
//! One monitoring run: Fetch → Detect → [Classify → Assemble] → persist.
//!
//! Everything durable happens after the report is assembled in memory, in the
//! order history → report → latest. The latest snapshot therefore only moves
//! forward once the rest of the run has been recorded, and a history record
//! whose report or snapshot could not be written is removed again.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::classify::{classify_all, ClassifiedChange, Classifier};
use crate::config::ReportConfig;
use crate::detect::{detect, ChangeRecord};
use crate::fetch::{fetch_all, Fetcher, SourceStatus};
use crate::report::{assemble, ReportInput};
use crate::snapshot::Snapshot;
use crate::store::{ReportSink, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fetch, detect, classify, write report + snapshots.
    Full,
    /// Fetch, detect, write snapshots; no classification, no report.
    CheckOnly,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub changes: Vec<ChangeRecord>,
    pub classified: Vec<ClassifiedChange>,
    pub statuses: Vec<SourceStatus>,
    /// Name of the history record, when changes were found.
    pub historical: Option<String>,
    /// Where the report went (Full mode only).
    pub report: Option<String>,
}

impl RunOutcome {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

pub struct Monitor<'a> {
    pub catalog: &'a Catalog,
    pub fetcher: &'a dyn Fetcher,
    pub classifier: &'a dyn Classifier,
    pub store: &'a dyn SnapshotStore,
    pub reports: &'a dyn ReportSink,
    pub report: &'a ReportConfig,
    /// Pause between two source fetches.
    pub delay: Duration,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_runs_total", "Completed monitoring runs.");
        describe_counter!("monitor_changes_total", "Change records detected.");
        describe_gauge!("monitor_last_run_ts", "Unix ts of the last completed run.");
    });
}

impl Monitor<'_> {
    pub async fn run_once(&self, now: DateTime<Utc>, mode: RunMode) -> Result<RunOutcome> {
        ensure_metrics_described();

        let previous = self
            .store
            .load_latest()
            .context("loading latest snapshot")?;
        if previous.is_none() {
            tracing::info!("no previous snapshot, every entry counts as new");
        }

        let fetched = fetch_all(
            self.fetcher,
            self.catalog,
            previous.as_ref(),
            self.delay,
            now,
        )
        .await;
        if fetched.all_failed() {
            bail!(
                "no source could be fetched ({} of {} failed)",
                fetched.failed(),
                self.catalog.len()
            );
        }

        let changes = detect(previous.as_ref(), &fetched.snapshot);
        tracing::info!(
            changes = changes.len(),
            failed_sources = fetched.failed(),
            "change detection finished"
        );

        let (classified, report_text) = match mode {
            RunMode::CheckOnly => (Vec::new(), None),
            RunMode::Full => {
                let classified = if changes.is_empty() {
                    Vec::new()
                } else {
                    classify_all(self.classifier, changes.clone()).await
                };
                let text = assemble(&ReportInput {
                    generated_at: now,
                    title: &self.report.title,
                    catalog: self.catalog,
                    changes: &classified,
                    statuses: &fetched.statuses,
                    links: &self.report.links,
                });
                (classified, Some(text))
            }
        };

        let historical = if changes.is_empty() {
            None
        } else {
            Some(
                self.store
                    .save_historical(now, &changes)
                    .context("writing change history")?,
            )
        };
        let report = match self.persist_outputs(now, report_text.as_deref(), &fetched.snapshot) {
            Ok(report) => report,
            Err(e) => {
                // A retry must not see this run's changes twice.
                if let Some(name) = &historical {
                    if let Err(discard) = self.store.discard_historical(name) {
                        tracing::warn!(historical = %name, error = ?discard, "could not remove change record");
                    }
                }
                return Err(e);
            }
        };

        counter!("monitor_runs_total").increment(1);
        counter!("monitor_changes_total").increment(changes.len() as u64);
        gauge!("monitor_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            has_changes = !changes.is_empty(),
            historical = historical.as_deref().unwrap_or("-"),
            report = report.as_deref().unwrap_or("-"),
            "run complete"
        );

        Ok(RunOutcome {
            changes,
            classified,
            statuses: fetched.statuses,
            historical,
            report,
        })
    }

    /// Report first, then latest: latest only advances once the report exists.
    fn persist_outputs(
        &self,
        now: DateTime<Utc>,
        report_text: Option<&str>,
        snapshot: &Snapshot,
    ) -> Result<Option<String>> {
        let report = match report_text {
            Some(text) => Some(
                self.reports
                    .write_report(now, text)
                    .context("writing report")?,
            ),
            None => None,
        };
        self.store
            .save_latest(snapshot)
            .context("writing latest snapshot")?;
        Ok(report)
    }

    /// Rebuild a report from the newest history record without fetching.
    /// With no history at all this yields the no-changes report.
    pub async fn report_from_history(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let record = self
            .store
            .load_latest_historical()
            .context("loading change history")?;
        let changes = record.map(|r| r.changes).unwrap_or_default();

        let classified = if changes.is_empty() {
            Vec::new()
        } else {
            classify_all(self.classifier, changes.clone()).await
        };
        let text = assemble(&ReportInput {
            generated_at: now,
            title: &self.report.title,
            catalog: self.catalog,
            changes: &classified,
            statuses: &[],
            links: &self.report.links,
        });
        let report = self
            .reports
            .write_report(now, &text)
            .context("writing report")?;
        tracing::info!(changes = changes.len(), report = %report, "report regenerated from history");

        Ok(RunOutcome {
            changes,
            classified,
            statuses: Vec::new(),
            historical: None,
            report: Some(report),
        })
    }
}
