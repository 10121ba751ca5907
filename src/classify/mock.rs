// src/classify/mock.rs
use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{Classifier, ClassifierResponse, ClassifyRequest};

/// Always fails; every change ends up as an `Unknown` placeholder.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _req: &ClassifyRequest) -> Result<ClassifierResponse> {
        bail!("classifier disabled")
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic classifier for tests and local runs.
///
/// Answers with `fixed` unless the request's new text contains one of the
/// `overrides` needles (first match in insertion order wins), or matches a
/// `failing` needle, in which case it errors.
#[derive(Clone)]
pub struct MockClassifier {
    pub fixed: ClassifierResponse,
    overrides: Vec<(String, ClassifierResponse)>,
    failing: Vec<String>,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self {
            fixed: ClassifierResponse {
                severity: "Low".to_string(),
                summary: "ドキュメントが更新されました（mock）".to_string(),
                impact: "影響は限定的です（mock）".to_string(),
                actions: vec!["リリースノートを確認してください".to_string()],
            },
            overrides: Vec::new(),
            failing: Vec::new(),
        }
    }
}

impl MockClassifier {
    pub fn new(fixed: ClassifierResponse) -> Self {
        Self {
            fixed,
            ..Self::default()
        }
    }

    /// Answer with `severity` for requests whose new text contains `needle`.
    pub fn with_severity(mut self, needle: &str, severity: &str) -> Self {
        let resp = ClassifierResponse {
            severity: severity.to_string(),
            ..self.fixed.clone()
        };
        self.overrides.push((needle.to_string(), resp));
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, req: &ClassifyRequest) -> Result<ClassifierResponse> {
        if let Some(n) = self.failing.iter().find(|n| req.new_text.contains(n.as_str())) {
            bail!("mock failure for `{n}`");
        }
        let resp = self
            .overrides
            .iter()
            .find(|(n, _)| req.new_text.contains(n.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| self.fixed.clone());
        Ok(resp)
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
