// src/store/memory.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::{stamped_name, HistoricalRecord, ReportSink, SnapshotStore};
use crate::detect::ChangeRecord;
use crate::snapshot::Snapshot;

/// In-process store for tests and dry runs. Same naming rules as [`super::FileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    latest: Mutex<Option<Snapshot>>,
    history: Mutex<Vec<(String, HistoricalRecord)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(snapshot: Snapshot) -> Self {
        Self {
            latest: Mutex::new(Some(snapshot)),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history_names(&self) -> Vec<String> {
        self.history
            .lock()
            .expect("history mutex poisoned")
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.latest.lock().expect("latest mutex poisoned").clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load_latest(&self) -> Result<Option<Snapshot>> {
        Ok(self.latest())
    }

    fn save_latest(&self, snapshot: &Snapshot) -> Result<()> {
        *self.latest.lock().expect("latest mutex poisoned") = Some(snapshot.clone());
        Ok(())
    }

    fn save_historical(
        &self,
        timestamp: DateTime<Utc>,
        changes: &[ChangeRecord],
    ) -> Result<String> {
        let mut h = self.history.lock().expect("history mutex poisoned");
        let mut attempt = 0;
        let name = loop {
            let candidate = stamped_name("changes", timestamp, attempt, "json");
            if !h.iter().any(|(n, _)| *n == candidate) {
                break candidate;
            }
            attempt += 1;
        };
        h.push((name.clone(), HistoricalRecord::new(timestamp, changes)));
        Ok(name)
    }

    fn load_latest_historical(&self) -> Result<Option<HistoricalRecord>> {
        let h = self.history.lock().expect("history mutex poisoned");
        Ok(h.last().map(|(_, r)| r.clone()))
    }

    fn discard_historical(&self, name: &str) -> Result<()> {
        self.history
            .lock()
            .expect("history mutex poisoned")
            .retain(|(n, _)| n != name);
        Ok(())
    }
}

/// Collects reports in memory.
#[derive(Debug, Default)]
pub struct MemoryReports {
    reports: Mutex<Vec<(String, String)>>,
}

impl MemoryReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(name, text)` pairs in write order.
    pub fn all(&self) -> Vec<(String, String)> {
        self.reports.lock().expect("reports mutex poisoned").clone()
    }

    pub fn last(&self) -> Option<String> {
        self.all().pop().map(|(_, text)| text)
    }
}

impl ReportSink for MemoryReports {
    fn write_report(&self, timestamp: DateTime<Utc>, text: &str) -> Result<String> {
        let mut r = self.reports.lock().expect("reports mutex poisoned");
        let mut attempt = 0;
        let name = loop {
            let candidate = stamped_name("report", timestamp, attempt, "md");
            if !r.iter().any(|(n, _)| *n == candidate) {
                break candidate;
            }
            attempt += 1;
        };
        r.push((name.clone(), text.to_string()));
        Ok(name)
    }
}
