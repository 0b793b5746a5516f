//! Anthropic Messages API backend implementation.
//!
//! Key differences from the OpenAI wire format:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - System instructions are a top-level `system` field, not a message
//! - No JSON response mode; the structured-output contract is enforced by
//!   the system prompt and by the caller's validation layer

use super::{BackendRequest, BackendResponse, ReasoningBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API backend.
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let api_key = super::resolve_api_key(config)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn build_request_body(&self, request: &BackendRequest) -> Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [
                { "role": "user", "content": request.user },
            ],
        })
    }

    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> BackendError {
        match status.as_u16() {
            401 | 403 => BackendError::AuthFailed {
                backend: "Anthropic".to_string(),
            },
            429 => {
                let retry_after = serde_json::from_str::<Value>(body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                BackendError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            _ => BackendError::ApiRequest {
                message: format!("HTTP {} from Anthropic API: {}", status, body_text),
            },
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            BackendError::Connection {
                message: format!("Connection to Anthropic API failed: {}", e),
            }
        } else {
            BackendError::ApiRequest {
                message: format!("Request to Anthropic API failed: {}", e),
            }
        }
    }

    /// Extract the text content from a Messages API response.
    fn parse_response(body: &Value) -> Result<BackendResponse, BackendError> {
        let content = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| BackendError::ResponseParse {
                message: "Missing content[0].text in response".to_string(),
            })?
            .to_string();
        let model = body["model"].as_str().unwrap_or("unknown").to_string();
        Ok(BackendResponse { content, model })
    }
}

#[async_trait]
impl ReasoningBackend for AnthropicBackend {
    async fn complete(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = self.model.as_str(),
            url = url.as_str(),
            "Sending Anthropic completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| BackendError::ResponseParse {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| BackendError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        Self::parse_response(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
