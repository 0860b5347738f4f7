use std::time::Duration;

use crate::errors::HarnessError;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_TIMEOUT_ENV: &str = "OPENAI_TIMEOUT_SECS";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client settings for `OpenAiProvider`.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub api_key: String,
    /// Root of an OpenAI-compatible endpoint; `/v1/responses` is appended.
    pub base_url: String,
    /// Whole-request timeout, streaming body included.
    pub timeout: Duration,
}

impl OpenAiClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` and
    /// `OPENAI_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, HarnessError> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(format!(
                "missing {OPENAI_API_KEY_ENV} for OpenAI provider"
            )));
        }
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var(OPENAI_BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            config.base_url = url.trim().to_string();
        }
        if let Ok(raw) = std::env::var(OPENAI_TIMEOUT_ENV) {
            config.timeout = parse_timeout_secs(&raw)?;
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn responses_url(&self) -> String {
        format!("{}/v1/responses", self.base_url.trim_end_matches('/'))
    }
}

fn parse_timeout_secs(raw: &str) -> Result<Duration, HarnessError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(HarnessError::Config(format!(
            "{OPENAI_TIMEOUT_ENV} must be a positive number of seconds, got {raw:?}"
        ))),
    }
}
