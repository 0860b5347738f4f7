use tracing::debug;

use super::{HeroApi, HeroApiConfig, HeroApiError};

/// Default data-service client using an async reqwest client.
#[derive(Clone, Debug)]
pub struct ReqwestHeroApi {
    client: reqwest::Client,
    config: HeroApiConfig,
}

impl ReqwestHeroApi {
    pub fn new(config: HeroApiConfig) -> Result<Self, HeroApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("flux-chat/0.1")
            .build()
            .map_err(|e| HeroApiError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Builds a client for `API_BASE_URL`.
    pub fn from_env() -> Result<Self, HeroApiError> {
        Self::new(HeroApiConfig::from_env())
    }

    pub fn config(&self) -> &HeroApiConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl HeroApi for ReqwestHeroApi {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, HeroApiError> {
        let url = self.config.url_for(path);
        debug!(
            event = "hero_api.request",
            domain = "http",
            path = path,
            query_params = query.len()
        );
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| HeroApiError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| HeroApiError::Transport(e.to_string()))?;
        if !status.is_success() {
            debug!(
                event = "hero_api.request_failed",
                domain = "http",
                path = path,
                status = status.as_u16()
            );
            return Err(HeroApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        debug!(
            event = "hero_api.request_succeeded",
            domain = "http",
            path = path,
            response_bytes = text.len() as u64
        );
        serde_json::from_str(&text).map_err(|e| HeroApiError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}
