//! Reasoning backend implementations.
//!
//! Provides concrete implementations of the `ReasoningBackend` trait for:
//! - OpenAI chat completions (JSON mode)
//! - Anthropic Messages API
//!
//! Both are stateless request/response clients; no streaming. The backend is
//! treated as an untrusted, fallible dependency: callers validate every
//! response and fall back to deterministic values on any failure.
//!
//! Use `create_backend()` to instantiate the appropriate backend from config.

pub mod anthropic;
pub mod openai;

use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

/// One stateless request to the reasoning backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Fixed instructions block (rubric or tone/format contract).
    pub system: String,
    /// Serialized task payload.
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Ask the backend for a single structured JSON object with no
    /// free-form preamble.
    pub json_mode: bool,
}

/// The raw text of a backend response, pre-validation.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub content: String,
    pub model: String,
}

/// A reasoning backend that produces one structured response per request.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Perform one completion and return the raw response text.
    async fn complete(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;

    /// Return the configured model name.
    fn model_name(&self) -> &str;
}

/// Create a reasoning backend based on the configuration.
///
/// Routes `"anthropic"` to [`AnthropicBackend`]; everything else goes to
/// [`OpenAiBackend`], which also covers OpenAI-compatible local endpoints
/// via `base_url`.
///
/// Returns `BackendError::AuthFailed` if the configured API key environment
/// variable is not set.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ReasoningBackend>, BackendError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicBackend::new(config)?)),
        _ => Ok(Arc::new(OpenAiBackend::new(config)?)),
    }
}

/// Resolve the API key from the environment variable named in the config.
pub(crate) fn resolve_api_key(config: &BackendConfig) -> Result<String, BackendError> {
    let key = std::env::var(&config.api_key_env).map_err(|_| BackendError::AuthFailed {
        backend: format!("env var '{}' not set", config.api_key_env),
    })?;
    if key.trim().is_empty() || key == "your_api_key_here" {
        return Err(BackendError::AuthFailed {
            backend: format!("env var '{}' holds a placeholder value", config.api_key_env),
        });
    }
    Ok(key)
}

/// Mock backend for tests: returns queued responses in order, or a canned
/// error when the queue holds one.
pub struct MockBackend {
    model: String,
    responses: std::sync::Mutex<Vec<Result<BackendResponse, BackendError>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a MockBackend that always returns the given text.
    ///
    /// Queues multiple copies so it can serve repeated calls.
    pub fn with_response(text: &str) -> Self {
        let backend = Self::new();
        for _ in 0..20 {
            backend.queue_ok(text);
        }
        backend
    }

    /// Create a MockBackend that always fails with a timeout.
    pub fn failing() -> Self {
        let backend = Self::new();
        for _ in 0..20 {
            backend.queue_err(BackendError::Timeout { timeout_secs: 30 });
        }
        backend
    }

    /// Queue a successful response for the next `complete` call.
    pub fn queue_ok(&self, text: &str) {
        self.responses.lock().unwrap().push(Ok(BackendResponse {
            content: text.to_string(),
            model: self.model.clone(),
        }));
    }

    /// Queue an error for the next `complete` call.
    pub fn queue_err(&self, err: BackendError) {
        self.responses.lock().unwrap().push(Err(err));
    }

    /// Number of responses still queued.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningBackend for MockBackend {
    async fn complete(&self, _request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(BackendError::Connection {
                message: "MockBackend has no queued responses".to_string(),
            });
        }
        responses.remove(0)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn request() -> BackendRequest {
        BackendRequest {
            system: "system".into(),
            user: "user".into(),
            temperature: 0.3,
            max_tokens: 64,
            json_mode: true,
        }
    }

    #[tokio::test]
    async fn test_mock_backend_returns_queued_in_order() {
        let backend = MockBackend::new();
        backend.queue_ok("first");
        backend.queue_ok("second");

        assert_eq!(backend.complete(request()).await.unwrap().content, "first");
        assert_eq!(backend.complete(request()).await.unwrap().content, "second");
        assert!(backend.complete(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_queued_error() {
        let backend = MockBackend::new();
        backend.queue_err(BackendError::RateLimited {
            retry_after_secs: 10,
        });
        let err = backend.complete(request()).await.unwrap_err();
        assert!(matches!(err, BackendError::RateLimited { .. }));
    }

    #[test]
    fn test_create_backend_missing_key() {
        std::env::remove_var("SOURCETRACE_NONEXISTENT_KEY");
        let config = BackendConfig {
            api_key_env: "SOURCETRACE_NONEXISTENT_KEY".to_string(),
            ..Default::default()
        };
        let result = create_backend(&config);
        assert!(matches!(result, Err(BackendError::AuthFailed { .. })));
    }

    #[test]
    fn test_create_backend_rejects_placeholder_key() {
        std::env::set_var("SOURCETRACE_PLACEHOLDER_KEY", "your_api_key_here");
        let config = BackendConfig {
            api_key_env: "SOURCETRACE_PLACEHOLDER_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_backend(&config),
            Err(BackendError::AuthFailed { .. })
        ));
        std::env::remove_var("SOURCETRACE_PLACEHOLDER_KEY");
    }

    #[test]
    fn test_create_backend_routes_by_provider() {
        std::env::set_var("SOURCETRACE_TEST_KEY", "sk-test-123456789");
        let mut config = BackendConfig {
            api_key_env: "SOURCETRACE_TEST_KEY".to_string(),
            ..Default::default()
        };

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.model_name(), "gpt-4o-mini");

        config.provider = "anthropic".to_string();
        config.model = "claude-sonnet-4-20250514".to_string();
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.model_name(), "claude-sonnet-4-20250514");
        std::env::remove_var("SOURCETRACE_TEST_KEY");
    }
}
