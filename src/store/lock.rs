// src/store/lock.rs
//! Advisory single-writer lock on the data directory.
//!
//! Two overlapping runs would both diff against the same `latest.json`, so the
//! pipeline holds this for its whole duration. The lock is released when the
//! guard is dropped (or the process dies).

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".monitor.lock";

#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Fails immediately if another process holds the lock.
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        let path = data_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "another monitor run holds {}; runs must not overlap",
                path.display()
            )
        })?;

        // Diagnostics only; the flock is what matters.
        let _ = file.set_len(0);
        let _ = writeln!(
            file,
            "pid={} started_at={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(error = ?e, path = %self.path.display(), "failed to release run lock");
        }
    }
}
