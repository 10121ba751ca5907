// src/store/mod.rs
//! Snapshot persistence: one overwritable "latest" snapshot plus an append-only
//! history of change records.

pub mod file;
pub mod lock;
pub mod memory;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::ChangeRecord;
use crate::snapshot::Snapshot;

pub use file::{FileStore, ReportDir};
pub use lock::RunLock;
pub use memory::{MemoryReports, MemoryStore};

/// Immutable record written whenever a run detects changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub has_changes: bool,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
}

impl HistoricalRecord {
    pub fn new(timestamp: DateTime<Utc>, changes: &[ChangeRecord]) -> Self {
        Self {
            timestamp,
            has_changes: !changes.is_empty(),
            changes: changes.to_vec(),
        }
    }
}

pub trait SnapshotStore: Send + Sync {
    /// `None` when no run has completed yet.
    fn load_latest(&self) -> Result<Option<Snapshot>>;
    /// Overwrites the latest snapshot unconditionally.
    fn save_latest(&self, snapshot: &Snapshot) -> Result<()>;
    /// Writes a new history record and returns its name. Never overwrites an existing record.
    fn save_historical(&self, timestamp: DateTime<Utc>, changes: &[ChangeRecord])
        -> Result<String>;
    /// Newest history record, if any.
    fn load_latest_historical(&self) -> Result<Option<HistoricalRecord>>;
    /// Removes a record returned by `save_historical` in the same run.
    /// Unknown names are not an error.
    fn discard_historical(&self, name: &str) -> Result<()>;
}

/// Destination of rendered reports.
pub trait ReportSink: Send + Sync {
    /// Stores `text` under a new timestamped name and returns where it went.
    fn write_report(&self, timestamp: DateTime<Utc>, text: &str) -> Result<String>;
}

/// `<prefix>_<YYYYMMDD_HHMMSS>` and, for the n-th collision, `<prefix>_<YYYYMMDD_HHMMSS>_<n>`.
pub(crate) fn stamped_name(prefix: &str, ts: DateTime<Utc>, attempt: u32, ext: &str) -> String {
    let stamp = ts.format("%Y%m%d_%H%M%S");
    if attempt == 0 {
        format!("{prefix}_{stamp}.{ext}")
    } else {
        format!("{prefix}_{stamp}_{attempt}.{ext}")
    }
}

/// True for `<prefix>_<8 digits>_<6 digits>[_<digits>].<ext>` and nothing else.
pub(crate) fn is_stamped_name(prefix: &str, ext: &str, name: &str) -> bool {
    let Some(rest) = name
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('_'))
        .and_then(|r| r.strip_suffix(ext))
        .and_then(|r| r.strip_suffix('.'))
    else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let parts: Vec<&str> = rest.split('_').collect();
    match parts.as_slice() {
        [date, time] => date.len() == 8 && time.len() == 6 && all_digits(date) && all_digits(time),
        [date, time, n] => {
            date.len() == 8 && time.len() == 6 && all_digits(date) && all_digits(time) && all_digits(n)
        }
        _ => false,
    }
}

/// Ordering key for stamped names: timestamp part first, then the collision counter.
pub(crate) fn stamped_order_key(name: &str) -> (String, u32) {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    let parts: Vec<&str> = stem.split('_').collect();
    // prefix, date, time[, counter]
    match parts.as_slice() {
        [_, date, time] => (format!("{date}{time}"), 0),
        [_, date, time, n] => (format!("{date}{time}"), n.parse().unwrap_or(0)),
        _ => (stem.to_string(), 0),
    }
}
