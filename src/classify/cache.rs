// src/classify/cache.rs
//! File cache + daily call limit around a real classifier.
//!
//! Reruns over the same change (e.g. after a failed store write) hit the
//! cache instead of paying for another API call. Only successful real calls
//! count toward the daily limit.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Classifier, ClassifierResponse, ClassifyRequest};
use crate::snapshot::fingerprint;

pub struct CachingClassifier<C: Classifier> {
    inner: C,
    cache_dir: PathBuf,
    daily_limit: u32,
    budget: Mutex<DailyBudget>,
}

impl<C: Classifier> CachingClassifier<C> {
    pub fn new(inner: C, cache_dir: PathBuf, daily_limit: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            tracing::warn!(error = ?e, dir = %cache_dir.display(), "classifier cache dir unavailable");
        }
        let budget = Mutex::new(load_budget(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            budget,
        }
    }

    fn cache_key(&self, req: &ClassifyRequest) -> String {
        let json = serde_json::to_string(req).unwrap_or_default();
        let full = fingerprint(&format!("{}\n{json}", self.inner.provider_name()));
        full[..32].to_string()
    }

    /// Calls made today against the real provider.
    pub fn calls_today(&self) -> u32 {
        let b = self.budget.lock().expect("budget mutex poisoned");
        if b.is_expired() {
            0
        } else {
            b.count
        }
    }
}

#[async_trait]
impl<C: Classifier> Classifier for CachingClassifier<C> {
    async fn classify(&self, req: &ClassifyRequest) -> Result<ClassifierResponse> {
        // 1) Cache lookup (free, even past the limit).
        let key = self.cache_key(req);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            tracing::debug!(key = %key, "classifier cache hit");
            return Ok(hit);
        }

        // 2) Daily limit.
        {
            let mut b = self.budget.lock().expect("budget mutex poisoned");
            if b.is_expired() {
                b.reset_to_today();
                let _ = save_budget(&self.cache_dir, &b);
            }
            if b.count >= self.daily_limit {
                bail!(
                    "daily classifier limit reached ({}/{})",
                    b.count,
                    self.daily_limit
                );
            }
        }

        // 3) Real call.
        let fresh = self.inner.classify(req).await?;
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &fresh) {
            tracing::warn!(error = ?e, key = %key, "classifier cache write failed");
        }
        let mut b = self.budget.lock().expect("budget mutex poisoned");
        b.count = b.count.saturating_add(1);
        let _ = save_budget(&self.cache_dir, &b);
        Ok(fresh)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// response cache files

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<ClassifierResponse> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &ClassifierResponse) -> io::Result<()> {
    let path = cache_path(dir, key);
    let json = serde_json::to_vec(value).map_err(io::Error::other)?;
    write_replace(&path, &json)
}

fn write_replace(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    fs::rename(tmp, path)?;
    Ok(())
}

// daily call budget

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyBudget {
    date: String,
    count: u32,
}

impl Default for DailyBudget {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyBudget {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn budget_path(dir: &Path) -> PathBuf {
    dir.join("calls_today.json")
}

fn load_budget(dir: &Path) -> io::Result<DailyBudget> {
    let s = fs::read_to_string(budget_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_budget(dir: &Path, budget: &DailyBudget) -> io::Result<()> {
    let json = serde_json::to_vec(budget).map_err(io::Error::other)?;
    write_replace(&budget_path(dir), &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MockClassifier;
    use crate::detect::ChangeKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        calls: AtomicU32,
        inner: MockClassifier,
    }

    #[async_trait]
    impl Classifier for Counting {
        async fn classify(&self, req: &ClassifyRequest) -> Result<ClassifierResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.classify(req).await
        }
        fn provider_name(&self) -> &'static str {
            "counting"
        }
    }

    fn req(text: &str) -> ClassifyRequest {
        ClassifyRequest {
            kind: ChangeKind::New,
            source: "agent".into(),
            old_text: None,
            new_text: text.into(),
        }
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let c = CachingClassifier::new(
            Counting {
                calls: AtomicU32::new(0),
                inner: MockClassifier::default(),
            },
            tmp.path().to_path_buf(),
            10,
        );
        let a = c.classify(&req("same")).await.unwrap();
        let b = c.classify(&req("same")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(c.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.calls_today(), 1);
    }

    #[tokio::test]
    async fn limit_blocks_real_calls_but_not_cache_hits() {
        let tmp = tempfile::tempdir().unwrap();
        let c = CachingClassifier::new(MockClassifier::default(), tmp.path().to_path_buf(), 1);
        assert!(c.classify(&req("first")).await.is_ok());
        let err = c.classify(&req("second")).await.unwrap_err();
        assert!(err.to_string().contains("daily classifier limit"));
        assert!(c.classify(&req("first")).await.is_ok());
    }

    #[tokio::test]
    async fn inner_failures_are_not_cached_or_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let c = CachingClassifier::new(
            MockClassifier::default().failing_on("boom"),
            tmp.path().to_path_buf(),
            5,
        );
        assert!(c.classify(&req("boom")).await.is_err());
        assert_eq!(c.calls_today(), 0);
    }
}
