// src/detect.rs
//! # Change Detector
//! Pure diff of two snapshots. No I/O, suitable for unit tests and for
//! replaying stored snapshots offline.
//!
//! Policy: an entry is `new` when its key has no counterpart in the previous
//! snapshot of the same source, `updated` when the key matches but the
//! fingerprint differs. Entries that disappeared are not reported.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::snapshot::{Entry, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Updated,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::New => f.write_str("new"),
            ChangeKind::Updated => f.write_str("updated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub source: String,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Entry>,
    pub new: Entry,
}

/// Diff `current` against `previous` (`None` on the very first run).
///
/// Records come out in the source order of `current`, then in entry order.
pub fn detect(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<ChangeRecord> {
    let mut out = Vec::new();

    for src in current.sources() {
        let prior = previous.and_then(|p| p.entries(&src.source)).unwrap_or(&[]);

        // First occurrence wins if a source ever repeats a key.
        let mut by_key: HashMap<&str, &Entry> = HashMap::with_capacity(prior.len());
        for e in prior {
            by_key.entry(e.key.as_str()).or_insert(e);
        }

        for entry in &src.entries {
            match by_key.get(entry.key.as_str()) {
                None => out.push(ChangeRecord {
                    source: src.source.clone(),
                    kind: ChangeKind::New,
                    old: None,
                    new: entry.clone(),
                }),
                Some(old) if old.fingerprint != entry.fingerprint => out.push(ChangeRecord {
                    source: src.source.clone(),
                    kind: ChangeKind::Updated,
                    old: Some((*old).clone()),
                    new: entry.clone(),
                }),
                Some(_) => tracing::trace!(source = %src.source, key = %entry.key, "unchanged"),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snap(sources: Vec<(&str, Vec<(&str, &str)>)>) -> Snapshot {
        let mut s = Snapshot::new(Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap());
        for (id, entries) in sources {
            s.insert(
                id,
                entries.into_iter().map(|(k, f)| Entry::new(k, f)).collect(),
            );
        }
        s
    }

    #[test]
    fn removed_entries_are_silent() {
        let p = snap(vec![("feedA", vec![("x1", "h1"), ("x2", "h2")])]);
        let c = snap(vec![("feedA", vec![("x2", "h2")])]);
        assert!(detect(Some(&p), &c).is_empty());
    }

    #[test]
    fn source_missing_from_previous_is_bootstrapped() {
        let p = snap(vec![("feedA", vec![("x1", "h1")])]);
        let c = snap(vec![("feedA", vec![("x1", "h1")]), ("feedB", vec![("y1", "g1"), ("y2", "g2")])]);
        let out = detect(Some(&p), &c);
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|r| r.source == "feedB" && r.kind == ChangeKind::New));
    }

    #[test]
    fn repeated_key_compares_against_first_prior_occurrence() {
        let p = snap(vec![("feedA", vec![("x1", "h1"), ("x1", "h9")])]);
        let c = snap(vec![("feedA", vec![("x1", "h1")])]);
        assert!(detect(Some(&p), &c).is_empty());
    }
}
