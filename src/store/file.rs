// src/store/file.rs
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{is_stamped_name, stamped_name, stamped_order_key, HistoricalRecord, ReportSink, SnapshotStore};
use crate::detect::ChangeRecord;
use crate::snapshot::Snapshot;

const LATEST_FILE: &str = "latest.json";
const HISTORY_PREFIX: &str = "changes";
const REPORT_PREFIX: &str = "report";
const MAX_COLLISIONS: u32 = 10_000;

/// JSON files under one data directory:
/// `latest.json` and `changes_<YYYYMMDD_HHMMSS>[_N].json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    fn history_names(&self) -> Result<Vec<String>> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("listing {}", self.dir.display()))
            }
        };
        let mut names = Vec::new();
        for e in rd.flatten() {
            let name = e.file_name().to_string_lossy().to_string();
            if is_stamped_name(HISTORY_PREFIX, "json", &name) {
                names.push(name);
            }
        }
        names.sort_by_key(|n| stamped_order_key(n));
        Ok(names)
    }
}

impl SnapshotStore for FileStore {
    fn load_latest(&self) -> Result<Option<Snapshot>> {
        let path = self.latest_path();
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let snap = serde_json::from_str(&s)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        Ok(Some(snap))
    }

    fn save_latest(&self, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating data dir {}", self.dir.display()))?;
        let json = serde_json::to_vec_pretty(snapshot).context("serializing latest snapshot")?;
        let path = self.latest_path();
        write_atomic(&path, &json).with_context(|| format!("writing {}", path.display()))
    }

    fn save_historical(
        &self,
        timestamp: DateTime<Utc>,
        changes: &[ChangeRecord],
    ) -> Result<String> {
        let record = HistoricalRecord::new(timestamp, changes);
        let json = serde_json::to_vec_pretty(&record).context("serializing change record")?;
        let path = write_stamped(&self.dir, HISTORY_PREFIX, timestamp, "json", &json)?;
        Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default())
    }

    fn load_latest_historical(&self) -> Result<Option<HistoricalRecord>> {
        let Some(name) = self.history_names()?.pop() else {
            return Ok(None);
        };
        let path = self.dir.join(&name);
        let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let rec = serde_json::from_str(&s)
            .with_context(|| format!("parsing change record {}", path.display()))?;
        Ok(Some(rec))
    }

    fn discard_historical(&self, name: &str) -> Result<()> {
        if !is_stamped_name(HISTORY_PREFIX, "json", name) {
            bail!("not a change history record: {name}");
        }
        let path = self.dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

/// Markdown reports under one directory: `report_<YYYYMMDD_HHMMSS>[_N].md`.
#[derive(Debug, Clone)]
pub struct ReportDir {
    dir: PathBuf,
}

impl ReportDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for ReportDir {
    fn write_report(&self, timestamp: DateTime<Utc>, text: &str) -> Result<String> {
        let path = write_stamped(&self.dir, REPORT_PREFIX, timestamp, "md", text.as_bytes())?;
        Ok(path.display().to_string())
    }
}

/// Create `<dir>/<prefix>_<stamp>[_N].<ext>` with create-new semantics; returns the path written.
pub fn write_stamped(
    dir: &Path,
    prefix: &str,
    ts: DateTime<Utc>,
    ext: &str,
    bytes: &[u8],
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for attempt in 0..MAX_COLLISIONS {
        let path = dir.join(stamped_name(prefix, ts, attempt, ext));
        let mut f = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).with_context(|| format!("creating {}", path.display())),
        };
        if let Err(e) = f.write_all(bytes).and_then(|_| f.sync_all()) {
            // Do not leave a truncated record behind.
            let _ = fs::remove_file(&path);
            return Err(e).with_context(|| format!("writing {}", path.display()));
        }
        return Ok(path);
    }
    bail!(
        "more than {MAX_COLLISIONS} {prefix} files for {} in {}",
        ts.format("%Y%m%d_%H%M%S"),
        dir.display()
    )
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}
