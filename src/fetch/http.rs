// src/fetch/http.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{feed::parse_feed, page::parse_page, Fetcher, ParseOptions};
use crate::catalog::{Source, SourceKind};
use crate::config::FetchConfig;
use crate::snapshot::Entry;

/// Live fetcher: one GET per source, parsed according to the source kind.
pub struct HttpFetcher {
    client: reqwest::Client,
    opts: ParseOptions,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.clamp(1, 10)))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            opts: cfg.parse_options(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<Entry>> {
        let body = self
            .client
            .get(&source.url)
            .send()
            .await
            .with_context(|| format!("GET {}", source.url))?
            .error_for_status()
            .with_context(|| format!("GET {} non-2xx", source.url))?
            .text()
            .await
            .with_context(|| format!("reading body of {}", source.url))?;

        match source.kind {
            SourceKind::Feed => parse_feed(&body, &self.opts),
            SourceKind::Page => parse_page(&body, source, &self.opts),
        }
        .with_context(|| format!("parsing {} `{}`", source.kind, source.id))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
