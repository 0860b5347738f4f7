//! Hero data-service client: JSON GETs against `API_BASE_URL`.
//! Pass your client when registering: `register_hero_tools(&mut registry, Arc::new(your_api))`.

mod reqwest_api;

use std::time::Duration;

pub use reqwest_api::ReqwestHeroApi;

/// Environment variable holding the data-service base URL.
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";
/// Base URL used when `API_BASE_URL` is unset or blank.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Error from data-service requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeroApiError {
    /// The client could not be built or the request never completed.
    #[error("hero api transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("hero api {path} failed: status={status} body={body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    /// The body was not JSON, or not the JSON shape a tool needs.
    #[error("hero api {path} returned unexpected data: {message}")]
    Decode { path: String, message: String },
}

/// Data-service abstraction. Implement and pass when registering.
#[async_trait::async_trait]
pub trait HeroApi: Send + Sync {
    /// GETs `path` (relative to the base URL) with optional query pairs and
    /// returns the decoded JSON body unchanged.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, HeroApiError>;
}

/// Connection settings for the data service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeroApiConfig {
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for HeroApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HeroApiConfig {
    /// Reads `API_BASE_URL`, falling back to the local default.
    pub fn from_env() -> Self {
        Self::default().base_url(resolve_base_url(std::env::var(API_BASE_URL_ENV).ok()))
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn resolve_base_url(raw: Option<String>) -> String {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_base_url_falls_back_to_default() {
        assert_eq!(resolve_base_url(None), DEFAULT_API_BASE_URL);
        assert_eq!(resolve_base_url(Some("  ".into())), DEFAULT_API_BASE_URL);
        assert_eq!(
            resolve_base_url(Some(" https://heroes.test/api ".into())),
            "https://heroes.test/api"
        );
    }

    #[test]
    fn url_for_joins_without_doubled_slashes() {
        let config = HeroApiConfig::default().base_url("https://heroes.test/api/");
        assert_eq!(
            config.url_for("/heroes/7/"),
            "https://heroes.test/api/heroes/7/"
        );
        assert_eq!(config.url_for("cards/"), "https://heroes.test/api/cards/");
    }

    #[test]
    fn status_error_mentions_path_and_status() {
        let err = HeroApiError::Status {
            path: "/heroes/7/".into(),
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "hero api /heroes/7/ failed: status=404 body=not found"
        );
    }
}
