// src/classify/mod.rs
//! Classifier boundary: change record in, severity + Japanese summary out.
//!
//! Providers are opaque; the core only normalizes whatever they return and
//! isolates failures per change (a failed change gets an `Unknown` placeholder).

pub mod anthropic;
pub mod cache;
pub mod mock;

use anyhow::{anyhow, Context, Result};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::classifier::ClassifierConfig;
use crate::detect::{ChangeKind, ChangeRecord};

pub use anthropic::AnthropicClassifier;
pub use cache::CachingClassifier;
pub use mock::{DisabledClassifier, MockClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// Lower sorts first in reports.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Unknown => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Unknown => "Unknown",
        }
    }

    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Unknown,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a provider's severity token onto [`Severity`].
///
/// Matching ignores case, surrounding brackets and punctuation. Anything not
/// recognized becomes `Medium` and the returned warning says so.
pub fn normalize_severity(token: &str) -> (Severity, Option<String>) {
    let cleaned: String = token
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let sev = match cleaned.as_str() {
        "critical" | "緊急" | "重大" => Some(Severity::Critical),
        "high" | "高" => Some(Severity::High),
        "medium" | "moderate" | "中" => Some(Severity::Medium),
        "low" | "低" => Some(Severity::Low),
        _ => None,
    };
    match sev {
        Some(s) => (s, None),
        None => (
            Severity::Medium,
            Some(format!(
                "未知の重要度「{}」を Medium として扱いました",
                token.trim()
            )),
        ),
    }
}

/// What the provider sees for one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub kind: ChangeKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    pub new_text: String,
}

impl ClassifyRequest {
    pub fn from_record(rec: &ChangeRecord) -> Self {
        Self {
            kind: rec.kind,
            source: rec.source.clone(),
            old_text: rec.old.as_ref().map(|e| e.describe()),
            new_text: rec.new.describe(),
        }
    }
}

/// Raw provider answer; `severity` is an unvalidated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierResponse {
    /// Missing means the model gave no token; normalized to Medium with a warning.
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default, alias = "recommended_actions")]
    pub actions: Vec<String>,
}

impl ClassifierResponse {
    /// Tolerant parse of model output: code fences and prose around the JSON object are ignored.
    pub fn from_model_text(text: &str) -> Result<Self> {
        let start = text
            .find('{')
            .ok_or_else(|| anyhow!("no JSON object in classifier output"))?;
        let end = text
            .rfind('}')
            .filter(|e| *e > start)
            .ok_or_else(|| anyhow!("unterminated JSON object in classifier output"))?;
        serde_json::from_str(&text[start..=end]).context("parsing classifier JSON")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedChange {
    pub record: ChangeRecord,
    pub severity: Severity,
    pub summary: String,
    pub impact: String,
    pub actions: Vec<String>,
    /// Classification failure or severity-normalization warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ClassifiedChange {
    pub fn from_response(record: ChangeRecord, resp: ClassifierResponse) -> Self {
        let (severity, note) = normalize_severity(&resp.severity);
        if let Some(n) = &note {
            tracing::warn!(source = %record.source, key = %record.new.key, token = %resp.severity, "{n}");
        }
        Self {
            record,
            severity,
            summary: resp.summary.trim().to_string(),
            impact: resp.impact.trim().to_string(),
            actions: resp
                .actions
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            note,
        }
    }

    /// Placeholder used when the classifier failed for this change.
    pub fn unclassified(record: ChangeRecord, reason: &str) -> Self {
        Self {
            record,
            severity: Severity::Unknown,
            summary: String::new(),
            impact: String::new(),
            actions: Vec::new(),
            note: Some(format!("分類に失敗しました（classification failed）: {reason}")),
        }
    }
}

#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, req: &ClassifyRequest) -> Result<ClassifierResponse>;
    fn provider_name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_classified_total", "Changes classified successfully.");
        describe_counter!(
            "monitor_classify_failures_total",
            "Changes rendered with a placeholder because classification failed."
        );
        describe_counter!(
            "monitor_severity_normalized_total",
            "Classifier severity tokens that were not recognized."
        );
    });
}

/// Classify every record in order. One failure never affects the others.
pub async fn classify_all(
    classifier: &dyn Classifier,
    records: Vec<ChangeRecord>,
) -> Vec<ClassifiedChange> {
    ensure_metrics_described();

    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        let req = ClassifyRequest::from_record(&rec);
        match classifier.classify(&req).await {
            Ok(resp) => {
                let c = ClassifiedChange::from_response(rec, resp);
                if c.note.is_some() {
                    counter!("monitor_severity_normalized_total").increment(1);
                }
                counter!("monitor_classified_total").increment(1);
                out.push(c);
            }
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    source = %rec.source,
                    key = %rec.new.key,
                    provider = classifier.provider_name(),
                    "classification failed, using placeholder"
                );
                counter!("monitor_classify_failures_total").increment(1);
                out.push(ClassifiedChange::unclassified(rec, &format!("{e:#}")));
            }
        }
    }
    out
}

/// Factory: build a classifier according to config.
///
/// * `enabled == false` → [`DisabledClassifier`] (every change gets a placeholder).
/// * `provider == "mock"` → deterministic [`MockClassifier`].
/// * otherwise the Anthropic provider wrapped with caching + daily limit.
pub fn build_classifier(cfg: &ClassifierConfig) -> Result<DynClassifier> {
    if !cfg.enabled {
        return Ok(Arc::new(DisabledClassifier));
    }
    match cfg.provider.as_str() {
        "mock" => Ok(Arc::new(MockClassifier::default())),
        "anthropic" | "claude" => {
            let api_key = cfg.resolve_api_key()?;
            let provider = AnthropicClassifier::new(api_key, &cfg.model, cfg.max_tokens)?;
            Ok(Arc::new(CachingClassifier::new(
                provider,
                cfg.cache_dir.clone(),
                cfg.daily_limit,
            )))
        }
        other => anyhow::bail!("Unsupported classifier provider: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_tokens_are_normalized() {
        assert_eq!(normalize_severity("Critical"), (Severity::Critical, None));
        assert_eq!(normalize_severity(" [HIGH] "), (Severity::High, None));
        assert_eq!(normalize_severity("low."), (Severity::Low, None));
        assert_eq!(normalize_severity("中"), (Severity::Medium, None));

        let (sev, warn) = normalize_severity("urgent!!");
        assert_eq!(sev, Severity::Medium);
        assert!(warn.unwrap().contains("urgent!!"));
    }

    #[test]
    fn empty_token_is_medium_with_warning() {
        let (sev, warn) = normalize_severity("");
        assert_eq!(sev, Severity::Medium);
        assert!(warn.is_some());
    }

    #[test]
    fn model_text_with_fences_parses() {
        let text = "Here you go:\n```json\n{\"severity\": \"High\", \"summary\": \"要約\", \"recommended_actions\": [\"更新する\"]}\n```";
        let r = ClassifierResponse::from_model_text(text).unwrap();
        assert_eq!(r.severity, "High");
        assert_eq!(r.summary, "要約");
        assert_eq!(r.impact, "");
        assert_eq!(r.actions, vec!["更新する".to_string()]);
    }

    #[test]
    fn missing_severity_becomes_medium_with_warning() {
        let r = ClassifierResponse::from_model_text(r#"{"summary": "変更なし", "impact": "小"}"#)
            .unwrap();
        assert_eq!(r.severity, "");

        let record = crate::detect::ChangeRecord {
            source: "agent".into(),
            kind: crate::detect::ChangeKind::New,
            old: None,
            new: crate::snapshot::Entry::new("k1", "h1"),
        };
        let c = ClassifiedChange::from_response(record, r);
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(c.summary, "変更なし");
        assert!(c.note.is_some());
    }

    #[test]
    fn model_text_without_json_is_an_error() {
        assert!(ClassifierResponse::from_model_text("sorry, no").is_err());
    }

    #[test]
    fn ranks_are_strictly_ordered() {
        let ranks: Vec<u8> = Severity::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
    }
}
