// src/classify/anthropic.rs
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Classifier, ClassifierResponse, ClassifyRequest};
use crate::detect::ChangeKind;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "あなたは製品ドキュメントの変更を分析する技術ドキュメントの専門家です。\
お客様向けに分かりやすい日本語で、変更の重要度・概要・お客様への影響・推奨アクションを判定してください。\
重要度は Critical / High / Medium / Low のいずれかです。\
セキュリティ、脆弱性、EOL（サポート終了）、非推奨化に関する変更は重要度を高く評価してください。\
専門用語は日本語訳の後にカッコ書きで英語を併記してください。\
出力は次の形式の JSON オブジェクトのみとし、前後に説明文を付けないでください: \
{\"severity\": \"High\", \"summary\": \"…\", \"impact\": \"…\", \"actions\": [\"…\"]}";

/// Anthropic Messages API provider. Requires an API key.
pub struct AnthropicClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl AnthropicClassifier {
    pub fn new(api_key: String, model: &str, max_tokens: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("docs-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .context("building classifier http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            max_tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at a proxy or a local stand-in.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// User turn for one change.
pub fn user_prompt(req: &ClassifyRequest) -> String {
    let kind = match req.kind {
        ChangeKind::New => "新規追加",
        ChangeKind::Updated => "内容更新",
    };
    let mut out = format!("以下のドキュメント変更（{kind}、ソース: {}）を分析してください。\n\n", req.source);
    if let Some(old) = &req.old_text {
        out.push_str("変更前:\n");
        out.push_str(old);
        out.push_str("\n\n変更後:\n");
    } else {
        out.push_str("内容:\n");
    }
    out.push_str(&req.new_text);
    out
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, req: &ClassifyRequest) -> Result<ClassifierResponse> {
        if self.api_key.is_empty() {
            bail!("classifier API key is empty");
        }

        let prompt = user_prompt(req);
        let body = Req {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
        };

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("classifier request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            bail!("classifier returned {status}: {snippet}");
        }

        let parsed: Resp = resp.json().await.context("classifier response body")?;
        let text = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(anyhow!("classifier returned no text"));
        }
        ClassifierResponse::from_model_text(&text)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
