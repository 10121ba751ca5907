// src/config/classifier.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_daily_limit() -> u32 {
    50
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/classifier")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "anthropic" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY at runtime.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Real API calls per day; cache hits are not counted.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            daily_limit: default_daily_limit(),
            max_tokens: default_max_tokens(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl ClassifierConfig {
    /// Lowercases the provider and clamps limits to usable values.
    pub(crate) fn normalize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
    }

    /// Resolves the "ENV" placeholder. A missing key is an error only for the real provider.
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return Ok(self.api_key.trim().to_string());
        }
        match self.provider.as_str() {
            "anthropic" | "claude" => env::var(ENV_ANTHROPIC_API_KEY)
                .map_err(|_| anyhow::anyhow!("Missing {ENV_ANTHROPIC_API_KEY} env var")),
            "mock" => Ok(String::new()),
            other => anyhow::bail!("Unsupported classifier provider in config: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_key_is_used_verbatim() {
        let cfg = ClassifierConfig {
            api_key: " sk-test ".into(),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn unknown_provider_with_env_key_fails() {
        let mut cfg = ClassifierConfig {
            provider: "OpenAI".into(),
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.provider, "openai");
        assert!(cfg.resolve_api_key().is_err());
    }
}
