//! OpenAI chat-completions backend implementation.
//!
//! Implements `ReasoningBackend` against the OpenAI chat completions API,
//! using JSON mode (`response_format: {"type": "json_object"}`) so the
//! response can be parsed without natural-language extraction. Also covers
//! OpenAI-compatible endpoints (Azure, local servers) via `base_url`.

use super::{BackendRequest, BackendResponse, ReasoningBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// The default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`. Returns `BackendError::AuthFailed` if it is
    /// missing or a placeholder.
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

    /// Build the JSON request body for the chat completions endpoint.
    fn build_request_body(&self, request: &BackendRequest) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    /// Map an HTTP error status to the appropriate `BackendError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> BackendError {
        match status.as_u16() {
            401 | 403 => BackendError::AuthFailed {
                backend: "OpenAI".to_string(),
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
                message: format!("HTTP {} from OpenAI API: {}", status, body_text),
            },
        }
    }

    /// Map a reqwest transport error, distinguishing timeouts.
    fn map_transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            BackendError::Connection {
                message: format!("Connection to OpenAI API failed: {}", e),
            }
        } else {
            BackendError::ApiRequest {
                message: format!("Request to OpenAI API failed: {}", e),
            }
        }
    }

    /// Extract the assistant content from a chat completions response.
    fn parse_response(body: &Value) -> Result<BackendResponse, BackendError> {
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BackendError::ResponseParse {
                message: "Missing choices[0].message.content in response".to_string(),
            })?
            .to_string();
        let model = body["model"].as_str().unwrap_or("unknown").to_string();
        Ok(BackendResponse { content, model })
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    async fn complete(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = self.model.as_str(),
            url = url.as_str(),
            json_mode = request.json_mode,
            "Sending OpenAI completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OpenAiBackend {
        std::env::set_var("OPENAI_TEST_KEY_UNIT", "sk-test-0123456789");
        let config = BackendConfig {
            api_key_env: "OPENAI_TEST_KEY_UNIT".to_string(),
            ..Default::default()
        };
        OpenAiBackend::new(&config).unwrap()
    }

    #[test]
    fn test_build_request_body_json_mode() {
        let b = backend();
        let body = b.build_request_body(&BackendRequest {
            system: "rubric".into(),
            user: "signals".into(),
            temperature: 0.3,
            max_tokens: 1024,
            json_mode: true,
        });
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "signals");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_build_request_body_without_json_mode() {
        let b = backend();
        let body = b.build_request_body(&BackendRequest {
            system: "s".into(),
            user: "u".into(),
            temperature: 0.5,
            max_tokens: 800,
            json_mode: false,
        });
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [
                { "message": { "role": "assistant", "content": "{\"confidence\": 80}" } }
            ]
        });
        let parsed = OpenAiBackend::parse_response(&body).unwrap();
        assert_eq!(parsed.content, "{\"confidence\": 80}");
        assert_eq!(parsed.model, "gpt-4o-mini");
    }

    #[test]
    fn test_parse_response_missing_content() {
        let body = serde_json::json!({ "model": "gpt-4o-mini", "choices": [] });
        let err = OpenAiBackend::parse_response(&body).unwrap_err();
        assert!(matches!(err, BackendError::ResponseParse { .. }));
    }

    #[test]
    fn test_map_http_error_auth() {
        let err = OpenAiBackend::map_http_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, BackendError::AuthFailed { .. }));
    }

    #[test]
    fn test_map_http_error_rate_limit_reads_retry_after() {
        let err = OpenAiBackend::map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"retry_after_secs": 12}}"#,
        );
        match err {
            BackendError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 12),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }
}
