//! # Configuration Management
//!
//! Loads application configuration from multiple sources, in priority order:
//!
//! 1. Environment variables (`APP__`-prefixed, plus a few deployment
//!    conventions: `HOST`, `PORT`, `MISTRAL_API_KEY`)
//! 2. Configuration file (`config.toml`)
//! 3. Built-in defaults
//!
//! The result is constructed once at process start, validated, and then
//! passed by reference into the session controller and handlers. There are
//! no ambient globals: the verdict thresholds, session limits, and blend
//! weights all travel through this struct.

use crate::analysis::aggregator::BlendWeights;
use crate::analysis::verdict::VerdictThresholds;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scoring: ScoringConfig,
    pub limits: LimitsConfig,
    pub thresholds: VerdictThresholds,
    pub aggregation: BlendWeights,
    pub auth: AuthConfig,
}

/// Server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Hosted scoring model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Chat-completions endpoint base URL
    pub base_url: String,

    /// API key for the model endpoint. Empty means demo mode: the service
    /// serves canned responses and never calls out.
    pub api_key: String,

    /// Model used for audio chunks and uploaded recordings
    pub audio_model: String,

    /// Model used for transcripts and the second-opinion path
    pub text_model: String,

    /// Hard ceiling for one scoring call, in seconds
    pub request_timeout_secs: u64,
}

/// Resource limits. Enforced by the handlers and the session controller,
/// never hardcoded at call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum upload size for single-shot audio analysis, in MiB
    pub max_audio_size_mb: usize,

    /// Maximum transcript length for single-shot text analysis, in chars
    pub max_transcript_chars: usize,

    /// Maximum size of one streamed chunk, in bytes
    pub max_chunk_bytes: usize,

    /// Maximum chunks processed per streaming session
    pub max_chunks_per_session: u32,

    /// Streaming receive timeout, in seconds
    pub receive_timeout_secs: u64,

    /// RMS amplitude below which a chunk counts as silence
    pub silence_rms_threshold: f64,
}

/// API key authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path to the API keys file. A missing file leaves all endpoints open
    /// (dev mode).
    pub keys_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            scoring: ScoringConfig {
                base_url: "https://api.mistral.ai".to_string(),
                api_key: String::new(),
                audio_model: "voxtral-mini-latest".to_string(),
                text_model: "mistral-large-latest".to_string(),
                request_timeout_secs: 120,
            },
            limits: LimitsConfig {
                max_audio_size_mb: 25,
                max_transcript_chars: 10_000,
                max_chunk_bytes: 512 * 1024,
                max_chunks_per_session: 60,
                receive_timeout_secs: 30,
                silence_rms_threshold: 500.0,
            },
            thresholds: VerdictThresholds::default(),
            aggregation: BlendWeights::default(),
            auth: AuthConfig {
                keys_file: "api_keys.json".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then `config.toml`, then environment.
    ///
    /// Environment variables use a double-underscore separator so that
    /// multi-word keys survive: `APP__LIMITS__MAX_CHUNK_BYTES=262144`.
    /// `HOST`, `PORT`, and `MISTRAL_API_KEY` are honored without the prefix
    /// for deployment platforms.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(api_key) = env::var("MISTRAL_API_KEY") {
            settings = settings.set_override("scoring.api_key", api_key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Catch configuration mistakes at startup instead of mid-session.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.scoring.base_url.is_empty() {
            return Err(anyhow::anyhow!("Scoring base URL cannot be empty"));
        }

        if self.scoring.audio_model.is_empty() || self.scoring.text_model.is_empty() {
            return Err(anyhow::anyhow!("Scoring model names cannot be empty"));
        }

        if self.scoring.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Scoring request timeout must be at least 1s"));
        }

        if self.limits.max_chunk_bytes == 0 {
            return Err(anyhow::anyhow!("Max chunk size must be greater than 0"));
        }

        if self.limits.max_chunks_per_session == 0 {
            return Err(anyhow::anyhow!("Max chunks per session must be greater than 0"));
        }

        if self.limits.receive_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Receive timeout must be at least 1s"));
        }

        if self.limits.silence_rms_threshold < 0.0 {
            return Err(anyhow::anyhow!("Silence RMS threshold cannot be negative"));
        }

        self.thresholds.validate().map_err(|e| anyhow::anyhow!(e))?;

        self.aggregation.validate().map_err(|e| anyhow::anyhow!(e))?;

        Ok(())
    }

    /// Whether the service runs against canned responses instead of the
    /// hosted model.
    pub fn demo_mode(&self) -> bool {
        self.scoring.api_key.is_empty()
    }

    /// Upload size limit in bytes.
    pub fn max_audio_size_bytes(&self) -> usize {
        self.limits.max_audio_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.max_chunks_per_session, 60);
        assert_eq!(config.limits.max_chunk_bytes, 512 * 1024);
        assert_eq!(config.limits.receive_timeout_secs, 30);
        assert_eq!(config.limits.silence_rms_threshold, 500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_demo_mode() {
        let config = AppConfig::default();
        assert!(config.demo_mode());

        let mut live = config.clone();
        live.scoring.api_key = "key-123".to_string();
        assert!(!live.demo_mode());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.limits.max_chunks_per_session = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.limits.max_chunk_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.limits.receive_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unordered_thresholds() {
        let mut config = AppConfig::default();
        config.thresholds.suspicious = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audio_size_limit_in_bytes() {
        let config = AppConfig::default();
        assert_eq!(config.max_audio_size_bytes(), 25 * 1024 * 1024);
    }
}
