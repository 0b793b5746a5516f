//! Error types for the SourceTrace core.
//!
//! Uses `thiserror` for public API error types. The taxonomy mirrors the
//! propagation policy of the pipeline: backend and signal failures are
//! absorbed into fallback values or typed absence markers, while validation
//! errors (caller contract violations) surface directly.

use std::path::PathBuf;

/// Top-level error type for the SourceTrace core library.
#[derive(Debug, thiserror::Error)]
pub enum SourceTraceError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from reasoning-backend interactions.
///
/// Every variant resolves to the same fallback value in the synthesis and
/// outreach components; the distinction exists for log categories only.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for backend {backend}")]
    AuthFailed { backend: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Backend connection failed: {message}")]
    Connection { message: String },
}

impl BackendError {
    /// Short category label used as a structured log field when a backend
    /// failure is absorbed into a fallback value.
    pub fn category(&self) -> &'static str {
        match self {
            BackendError::ApiRequest { .. } => "api_request",
            BackendError::ResponseParse { .. } => "response_parse",
            BackendError::AuthFailed { .. } => "auth",
            BackendError::RateLimited { .. } => "rate_limit",
            BackendError::Timeout { .. } => "timeout",
            BackendError::Connection { .. } => "network",
        }
    }
}

/// Caller contract violations.
///
/// The only error class the core surfaces directly: the caller supplied
/// malformed input, as opposed to a transient external failure.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Field '{field}' must not be empty")]
    EmptyField { field: String },

    #[error("Unrecognized value '{value}' for {field}. Must be one of: {allowed}")]
    UnknownOption {
        field: String,
        value: String,
        allowed: String,
    },
}

/// Errors from signal collectors.
///
/// Never propagated past the orchestrator's collection stage; each is
/// converted to the signal's typed absence/error marker.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Unable to read media file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse signal data: {message}")]
    Parse { message: String },

    #[error("Network error during signal collection: {message}")]
    Network { message: String },

    #[error("Signal source blocked the request: {message}")]
    Blocked { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `SourceTraceError`.
pub type Result<T> = std::result::Result<T, SourceTraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_backend() {
        let err = SourceTraceError::Backend(BackendError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Backend error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_validation() {
        let err = SourceTraceError::Validation(ValidationError::UnknownOption {
            field: "scope".into(),
            value: "perpetual".into(),
            allowed: "single_use, multiple_use, exclusive".into(),
        });
        assert_eq!(
            err.to_string(),
            "Validation error: Unrecognized value 'perpetual' for scope. \
             Must be one of: single_use, multiple_use, exclusive"
        );
    }

    #[test]
    fn test_error_display_signal() {
        let err = SignalError::Blocked {
            message: "CAPTCHA detected".into(),
        };
        assert_eq!(
            err.to_string(),
            "Signal source blocked the request: CAPTCHA detected"
        );
    }

    #[test]
    fn test_backend_error_categories() {
        assert_eq!(
            BackendError::RateLimited {
                retry_after_secs: 30
            }
            .category(),
            "rate_limit"
        );
        assert_eq!(
            BackendError::Timeout { timeout_secs: 30 }.category(),
            "timeout"
        );
        assert_eq!(
            BackendError::AuthFailed {
                backend: "openai".into()
            }
            .category(),
            "auth"
        );
        assert_eq!(
            BackendError::ResponseParse {
                message: "bad json".into()
            }
            .category(),
            "response_parse"
        );
    }

    #[test]
    fn test_error_display_missing_field() {
        let err = ValidationError::MissingField {
            field: "media path or --url".into(),
        };
        assert_eq!(err.to_string(), "Missing required field: media path or --url");
    }

    #[test]
    fn test_error_from_config() {
        let err: SourceTraceError = ConfigError::Invalid {
            message: "proceed_threshold must exceed high_risk_threshold".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: \
             proceed_threshold must exceed high_risk_threshold"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SourceTraceError = io_err.into();
        assert!(matches!(err, SourceTraceError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: SourceTraceError = serde_err.into();
        assert!(matches!(err, SourceTraceError::Serialization(_)));
    }
}
