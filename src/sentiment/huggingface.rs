//! Hosted inference client for text-classification models.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{SentimentProvider, SentimentScore};
use crate::error::SentimentError;

/// Default inference endpoint prefix.
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// Default sentiment model.
pub const DEFAULT_MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";

/// Connection settings for the inference endpoint.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

/// Sentiment provider backed by the hosted inference API.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    config: HuggingFaceConfig,
}

/// Single-input responses come back nested one level deeper than batch ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<SentimentScore>>),
    Flat(Vec<SentimentScore>),
}

impl InferenceResponse {
    fn into_scores(self) -> Vec<SentimentScore> {
        match self {
            Self::Nested(mut outer) => {
                if outer.is_empty() {
                    Vec::new()
                } else {
                    outer.swap_remove(0)
                }
            }
            Self::Flat(scores) => scores,
        }
    }
}

impl HuggingFaceProvider {
    pub fn new(config: HuggingFaceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl SentimentProvider for HuggingFaceProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn score(&self, text: &str) -> Result<Vec<SentimentScore>, SentimentError> {
        let mut request = self
            .client
            .post(self.endpoint())
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SentimentError::RateLimited {
                    model: self.config.model.clone(),
                });
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                return Err(SentimentError::ModelLoading {
                    model: self.config.model.clone(),
                });
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(SentimentError::RequestFailed {
                    model: self.config.model.clone(),
                    reason: format!("HTTP {}: {}", s, body.chars().take(200).collect::<String>()),
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        let scores = parse_scores(&body).map_err(|reason| SentimentError::InvalidResponse {
            model: self.config.model.clone(),
            reason,
        })?;

        debug!(model = %self.config.model, labels = scores.len(), "Sentiment scored");
        Ok(scores)
    }
}

/// Parse either response shape into a flat score list.
fn parse_scores(body: &str) -> Result<Vec<SentimentScore>, String> {
    serde_json::from_str::<InferenceResponse>(body)
        .map(InferenceResponse::into_scores)
        .map_err(|e| format!("JSON parse error: {e}"))
}
