//! Configuration system for SourceTrace.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment. Configuration is loaded from
//! `~/.config/sourcetrace/config.toml` and/or `.sourcetrace/config.toml` in
//! the working directory. Credentials are never stored in config files; the
//! backend reads its API key from the environment variable named in
//! `backend.api_key_env`.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the triage pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageConfig {
    pub backend: BackendConfig,
    pub synthesis: SynthesisConfig,
    pub outreach: OutreachConfig,
    pub search: SearchConfig,
    pub media: MediaConfig,
}

/// Configuration for the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend name: "openai" or "anthropic".
    pub provider: String,
    /// Model identifier (e.g. "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Wall-clock timeout for one backend call. Exceeding it is treated
    /// identically to any other backend failure.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

/// Configuration for the synthesis engine.
///
/// The confidence->recommendation boundaries are policy constants, not
/// hardcoded magic numbers: `confidence >= proceed_threshold` maps to
/// `proceed`, `confidence < high_risk_threshold` maps to `high_risk`, and
/// everything between maps to `manual_review`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Sampling temperature. Kept low to favor score stability across
    /// repeated calls on the same input.
    pub temperature: f32,
    /// Maximum tokens in the structured response.
    pub max_tokens: usize,
    /// Inclusive lower bound of the `proceed` band.
    pub proceed_threshold: u8,
    /// Exclusive upper bound of the `high_risk` band.
    pub high_risk_threshold: u8,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1024,
            proceed_threshold: 70,
            high_risk_threshold: 40,
        }
    }
}

/// Configuration for the outreach generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    /// Sampling temperature. Higher than synthesis: tone generation, no
    /// downstream logic depends on exact wording.
    pub temperature: f32,
    pub max_tokens: usize,
    /// Maximum outreach message length in words. Enforced both by prompt
    /// instruction and by post-hoc truncation.
    pub max_words: usize,
    /// Sender name interpolated into drafted messages.
    pub sender_name: String,
    /// Sender organization interpolated into drafted messages.
    pub sender_organization: String,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 800,
            max_words: 150,
            sender_name: "Metro News Desk Reporter".to_string(),
            sender_organization: "Metro News Desk".to_string(),
        }
    }
}

/// Configuration for the reverse-search collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Timeout for one search request.
    pub timeout_secs: u64,
    /// Maximum number of matches to keep from the result page.
    pub max_matches: usize,
    /// User agent sent with search requests.
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_matches: 5,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Configuration for media loading (local files and remote downloads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Maximum media size in bytes. Larger inputs are rejected before any
    /// signal collection runs.
    pub max_bytes: u64,
    /// Timeout for downloading a remote media URL.
    pub fetch_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            fetch_timeout_secs: 30,
        }
    }
}

/// Load configuration with the standard layering:
/// defaults -> user config -> workspace config -> `SOURCETRACE_` env vars
/// -> explicit overrides.
///
/// Environment variables use `__` as the section separator, e.g.
/// `SOURCETRACE_BACKEND__MODEL=gpt-4o`.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&TriageConfig>,
) -> Result<TriageConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TriageConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "sourcetrace", "sourcetrace") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".sourcetrace").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    figment = figment.merge(Env::prefixed("SOURCETRACE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: TriageConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    validate(&config)?;
    Ok(config)
}

/// Cross-field checks figment cannot express.
fn validate(config: &TriageConfig) -> Result<(), ConfigError> {
    if config.synthesis.proceed_threshold <= config.synthesis.high_risk_threshold {
        return Err(ConfigError::Invalid {
            message: format!(
                "proceed_threshold ({}) must be greater than high_risk_threshold ({})",
                config.synthesis.proceed_threshold, config.synthesis.high_risk_threshold
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TriageConfig::default();
        assert_eq!(config.backend.provider, "openai");
        assert_eq!(config.backend.model, "gpt-4o-mini");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.synthesis.proceed_threshold, 70);
        assert_eq!(config.synthesis.high_risk_threshold, 40);
        assert!(config.synthesis.temperature < config.outreach.temperature);
    }

    #[test]
    fn test_load_config_defaults_without_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config(Some(tmp.path()), None).unwrap();
        assert_eq!(config.backend.model, "gpt-4o-mini");
        assert_eq!(config.search.max_matches, 5);
        assert_eq!(config.media.max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_load_config_workspace_file_overrides_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg_dir = tmp.path().join(".sourcetrace");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[backend]\nmodel = \"gpt-4o\"\n\n[synthesis]\nproceed_threshold = 75\n",
        )
        .unwrap();

        let config = load_config(Some(tmp.path()), None).unwrap();
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.synthesis.proceed_threshold, 75);
        // Untouched sections keep their defaults
        assert_eq!(config.outreach.max_words, 150);
    }

    #[test]
    fn test_load_config_rejects_inverted_thresholds() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg_dir = tmp.path().join(".sourcetrace");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[synthesis]\nproceed_threshold = 30\nhigh_risk_threshold = 40\n",
        )
        .unwrap();

        let err = load_config(Some(tmp.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("proceed_threshold"));
    }

    #[test]
    fn test_load_config_malformed_toml_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg_dir = tmp.path().join(".sourcetrace");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[backend\nmodel =").unwrap();

        let err = load_config(Some(tmp.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_config_explicit_overrides_win() {
        let tmp = tempfile::tempdir().unwrap();
        let mut overrides = TriageConfig::default();
        overrides.backend.model = "claude-sonnet-4-20250514".to_string();
        overrides.backend.provider = "anthropic".to_string();

        let config = load_config(Some(tmp.path()), Some(&overrides)).unwrap();
        assert_eq!(config.backend.provider, "anthropic");
    }
}
