// src/fetch/fixture.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{feed::parse_feed, page::parse_page, Fetcher, ParseOptions};
use crate::catalog::{Source, SourceKind};
use crate::snapshot::Entry;

/// Serves canned bodies per source id through the same parsers as [`super::HttpFetcher`].
/// Sources without a body (or marked failing) return an error.
#[derive(Default)]
pub struct FixtureFetcher {
    bodies: Mutex<HashMap<String, std::result::Result<String, String>>>,
    opts: ParseOptions,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, opts: ParseOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_body(self, source: &str, body: impl Into<String>) -> Self {
        self.set_body(source, body);
        self
    }

    pub fn with_failure(self, source: &str, reason: impl Into<String>) -> Self {
        self.set_failure(source, reason);
        self
    }

    /// Swap a body between pipeline runs.
    pub fn set_body(&self, source: &str, body: impl Into<String>) {
        self.bodies
            .lock()
            .expect("fixture mutex poisoned")
            .insert(source.to_string(), Ok(body.into()));
    }

    pub fn set_failure(&self, source: &str, reason: impl Into<String>) {
        self.bodies
            .lock()
            .expect("fixture mutex poisoned")
            .insert(source.to_string(), Err(reason.into()));
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<Entry>> {
        let body = self
            .bodies
            .lock()
            .expect("fixture mutex poisoned")
            .get(&source.id)
            .cloned()
            .ok_or_else(|| anyhow!("no fixture for `{}`", source.id))?
            .map_err(|reason| anyhow!("{reason}"))?;

        match source.kind {
            SourceKind::Feed => parse_feed(&body, &self.opts),
            SourceKind::Page => parse_page(&body, source, &self.opts),
        }
        .with_context(|| format!("parsing fixture {} `{}`", source.kind, source.id))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
