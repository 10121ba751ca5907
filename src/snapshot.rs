// src/snapshot.rs
//! Observed state of every source at one point in time.
//!
//! On disk a snapshot is a JSON object `{ "taken_at": ..., "sources": { id: [entries] } }`.
//! The `sources` object keeps catalog order; readers ignore fields they do not know.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: String,
    pub text: String,
}

/// One content item of a source. Identity is `key`, content identity is `fingerprint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<Heading>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text_preview: String,
}

impl Entry {
    /// Bare entry; mostly useful in tests and for callers building entries by hand.
    pub fn new(key: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fingerprint: fingerprint.into(),
            title: String::new(),
            link: None,
            published: None,
            summary: String::new(),
            headings: Vec::new(),
            text_preview: String::new(),
        }
    }

    /// Text handed to the classifier: every descriptive field that is present.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str(&format!("Title: {}\n", self.title));
        }
        if let Some(p) = &self.published {
            out.push_str(&format!("Published: {p}\n"));
        }
        if let Some(l) = &self.link {
            out.push_str(&format!("Link: {l}\n"));
        }
        if !self.summary.is_empty() {
            out.push_str(&format!("Summary: {}\n", self.summary));
        }
        if !self.headings.is_empty() {
            out.push_str("Sections:\n");
            for h in &self.headings {
                out.push_str(&format!("- {}\n", h.text));
            }
        }
        if !self.text_preview.is_empty() {
            out.push_str(&format!("Preview:\n{}\n", self.text_preview));
        }
        if out.is_empty() {
            out.push_str(&self.key);
        }
        out
    }

    /// Human label: title, else link, else key.
    pub fn label(&self) -> &str {
        if !self.title.is_empty() {
            &self.title
        } else if let Some(l) = self.link.as_deref().filter(|l| !l.is_empty()) {
            l
        } else {
            &self.key
        }
    }
}

/// Hex sha256 of `text`.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntries {
    pub source: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    #[serde(
        serialize_with = "serialize_sources",
        deserialize_with = "deserialize_sources"
    )]
    sources: Vec<SourceEntries>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            sources: Vec::new(),
        }
    }

    /// Sets the entries of `source`, replacing them in place if the source is already present.
    pub fn insert(&mut self, source: impl Into<String>, entries: Vec<Entry>) {
        let source = source.into();
        match self.sources.iter_mut().find(|s| s.source == source) {
            Some(slot) => slot.entries = entries,
            None => self.sources.push(SourceEntries { source, entries }),
        }
    }

    /// Builder form of [`Snapshot::insert`].
    pub fn with(mut self, source: impl Into<String>, entries: Vec<Entry>) -> Self {
        self.insert(source, entries);
        self
    }

    pub fn entries(&self, source: &str) -> Option<&[Entry]> {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.entries.as_slice())
    }

    pub fn sources(&self) -> &[SourceEntries] {
        &self.sources
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s.source == source)
    }

    pub fn entry_count(&self) -> usize {
        self.sources.iter().map(|s| s.entries.len()).sum()
    }
}

fn serialize_sources<S: Serializer>(sources: &[SourceEntries], ser: S) -> Result<S::Ok, S::Error> {
    let mut map = ser.serialize_map(Some(sources.len()))?;
    for s in sources {
        map.serialize_entry(&s.source, &s.entries)?;
    }
    map.end()
}

fn deserialize_sources<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<SourceEntries>, D::Error> {
    struct OrderedSources;

    impl<'de> Visitor<'de> for OrderedSources {
        type Value = Vec<SourceEntries>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map from source id to a list of entries")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut out: Vec<SourceEntries> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((source, entries)) = access.next_entry::<String, Vec<Entry>>()? {
                match out.iter_mut().find(|s| s.source == source) {
                    Some(slot) => slot.entries = entries,
                    None => out.push(SourceEntries { source, entries }),
                }
            }
            Ok(out)
        }
    }

    de.deserialize_map(OrderedSources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn json_keeps_source_order() {
        let snap = Snapshot::new(ts())
            .with("zeta", vec![Entry::new("z1", "h1")])
            .with("alpha", vec![Entry::new("a1", "h2")]);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.find("\"zeta\"").unwrap() < json.find("\"alpha\"").unwrap());

        let back: Snapshot = serde_json::from_str(&json).unwrap();
        let order: Vec<_> = back.sources().iter().map(|s| s.source.as_str()).collect();
        assert_eq!(order, vec!["zeta", "alpha"]);
        assert_eq!(back, snap);
    }

    #[test]
    fn unknown_fields_are_ignored_and_optional_fields_default() {
        let json = r#"{
            "taken_at": "2025-10-01T06:00:00Z",
            "schema": 7,
            "sources": {
                "agent": [ { "key": "k", "fingerprint": "f", "reviewed_by": "someone" } ]
            }
        }"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();
        let e = &snap.entries("agent").unwrap()[0];
        assert_eq!(e, &Entry::new("k", "f"));
    }

    #[test]
    fn insert_replaces_existing_source() {
        let mut snap = Snapshot::new(ts()).with("a", vec![Entry::new("1", "x")]);
        snap.insert("a", vec![]);
        assert_eq!(snap.sources().len(), 1);
        assert_eq!(snap.entry_count(), 0);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint("abc");
        assert_eq!(
            fp,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn label_prefers_title_then_link() {
        let mut e = Entry::new("key", "fp");
        assert_eq!(e.label(), "key");
        e.link = Some("https://x".into());
        assert_eq!(e.label(), "https://x");
        e.title = "Release 1.2".into();
        assert_eq!(e.label(), "Release 1.2");
    }
}
