//! OpenRouter chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use xodiac_core::config::ReasoningConfig;

use super::reasoning::{CompletionRequest, ReasoningBackend};
use crate::error::ChatError;

/// HTTP client for a chat-completions endpoint with bearer auth.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(config: &ReasoningConfig) -> Result<Self, ChatError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl ReasoningBackend for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        if self.api_key.is_empty() {
            return Err(ChatError::Config(
                "reasoning API key is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport(e))?;
        debug!(status = status.as_u16(), body_len = body.len(), "Reasoning response received");

        if !status.is_success() {
            return Err(ChatError::Backend {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }
}

impl OpenRouterClient {
    fn map_transport(&self, err: reqwest::Error) -> ChatError {
        if err.is_timeout() {
            ChatError::Timeout(self.timeout)
        } else {
            ChatError::from(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = OpenRouterClient::new(&ReasoningConfig::default()).unwrap();
        let request = CompletionRequest {
            model: "m".to_string(),
            messages: vec![],
            stream: false,
            include_reasoning: true,
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = ReasoningConfig {
            timeout_secs: 0,
            ..ReasoningConfig::default()
        };
        let client = OpenRouterClient::new(&config).unwrap();
        assert_eq!(client.timeout, Duration::from_secs(1));
    }
}
