// Brain - Messages API client behind the Generator seam

use super::generator::Generator;
use super::wire::{Request, Response};
use super::{BrainConfig, BrainError, BrainInitError, Conversation};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// HTTP-backed code generator
#[derive(Debug, Clone)]
pub struct Brain {
    config: BrainConfig,
    client: Client,
}

impl Brain {
    pub fn new(config: BrainConfig) -> Result<Self, BrainInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!(
            endpoint = %config.endpoint,
            model = %config.default_model,
            max_retries = config.max_retries,
            "brain initialized"
        );
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.default_model
    }

    async fn post(&self, request: &Request<'_>) -> Result<Response, BrainError> {
        let url = format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "inference response");

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrainError::AuthenticationFailed(body),
            StatusCode::TOO_MANY_REQUESTS => BrainError::RateLimited(body),
            s if s.is_server_error() => BrainError::ModelError(format!("HTTP {s}: {body}")),
            s => BrainError::InvalidRequest(format!("HTTP {s}: {body}")),
        })
    }
}

/// Delay before retry `retry` (1-based): the base doubled per retry, capped
fn backoff(base_ms: u64, retry: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}

#[async_trait]
impl Generator for Brain {
    async fn generate(&self, conversation: &Conversation) -> Result<String, BrainError> {
        let request = Request::new(conversation, &self.config)?;
        let max_retries = self.config.max_retries;
        let mut retries = 0;

        let response = loop {
            match self.post(&request).await {
                Ok(response) => break response,
                Err(e) if e.is_transient() && retries < max_retries => {
                    retries += 1;
                    let delay = backoff(self.config.base_retry_delay_ms, retries);
                    warn!(
                        retry = retries,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(BrainError::Exhausted {
                        retries,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        };

        if response.truncated() {
            warn!("generation stopped at the token limit, response may be truncated");
        }
        let text = response.text();
        if text.trim().is_empty() {
            return Err(BrainError::EmptyResponse);
        }

        debug!(chars = text.len(), retries = retries, "generation completed");
        Ok(text)
    }
}
