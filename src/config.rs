//! Configuration management for cyclops
//!
//! Settings are loaded from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `CYCLOPS_PROVIDER`: Backend selection (local|cloud) - default: "local"
//! - `CYCLOPS_CLOUD_ENDPOINT`: Hosted API base URL - default: "https://api.openai.com"
//! - `CYCLOPS_CLOUD_MODEL`: Hosted model name - default: "gpt-4o"
//! - `OPENAI_API_KEY`: Credential for the cloud backend and speech synthesis
//! - `OLLAMA_HOST`: Local Ollama endpoint - default: "http://localhost:11434"
//! - `CYCLOPS_LOCAL_MODEL`: Local model name - default: "llama3.2-vision"
//! - `CYCLOPS_REQUEST_TIMEOUT`: Timeout in seconds - default: 30 (cloud) or 120 (local)
//! - `CYCLOPS_VERIFY_INTERVAL_MS`: Minimum gap between verifications per lesson - default: "2000"
//! - `CYCLOPS_STORAGE_DIR`: Lessons, videos, clips and audio - default: platform data dir + "cyclops"
//! - `CYCLOPS_TTS_ENABLED`: Synthesize spoken instructions (true|false) - default: "false"
//! - `CYCLOPS_TTS_VOICE`: Speech voice - default: "nova"
//! - `CYCLOPS_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use cyclops::CyclopsConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CyclopsConfig::default();
//! config.validate()?;
//!
//! let backend = config.create_backend()?;
//! println!("Using {}", backend.name());
//! # Ok(())
//! # }
//! ```

use crate::ai::cloud::DEFAULT_CLOUD_ENDPOINT;
use crate::ai::local::{DEFAULT_LOCAL_ENDPOINT, DEFAULT_LOCAL_MODEL};
use crate::ai::{create_backend, BackendConfig, BackendError, ModelBackend};
use crate::speech::{OpenAISpeech, SpeechError, SpeechSynthesizer, DEFAULT_VOICE};
use crate::verification::RateGate;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_CLOUD_MODEL: &str = "gpt-4o";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_VERIFY_INTERVAL_MS: u64 = 2000;
const DEFAULT_TTS_ENABLED: bool = false;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid provider name
    #[error("Invalid provider: {0}. Valid options: local, cloud")]
    InvalidProvider(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Backend initialization failed
    #[error("Backend initialization failed: {0}")]
    BackendInitError(#[from] BackendError),

    /// Speech synthesis initialization failed
    #[error("Speech initialization failed: {0}")]
    SpeechInitError(#[from] SpeechError),
}

/// Which backend variant to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    /// Ollama on this machine or the local network
    #[default]
    Local,
    /// Hosted OpenAI-compatible API
    Cloud,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Cloud => "cloud",
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "ollama" => Ok(Provider::Local),
            "cloud" | "openai" => Ok(Provider::Cloud),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration structure for cyclops
///
/// `Default::default()` loads from environment variables and falls back to
/// the defaults listed in the module documentation.
#[derive(Clone)]
pub struct CyclopsConfig {
    pub provider: Provider,

    pub cloud_endpoint: String,
    pub cloud_model: String,
    /// Credential for the cloud backend and speech synthesis
    pub api_key: Option<String>,

    pub local_endpoint: String,
    pub local_model: String,

    /// Overrides the variant's default timeout when set
    pub request_timeout_secs: Option<u64>,

    /// Minimum gap between accepted verifications of one lesson
    pub verify_interval_ms: u64,

    /// Root of lessons.json, videos/, clips/ and audio/
    pub storage_dir: PathBuf,

    pub tts_enabled: bool,
    pub tts_voice: String,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("cyclops"))
        .unwrap_or_else(|| PathBuf::from("storage"))
}

impl Default for CyclopsConfig {
    fn default() -> Self {
        let provider = env_nonempty("CYCLOPS_PROVIDER")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let request_timeout_secs =
            env_nonempty("CYCLOPS_REQUEST_TIMEOUT").and_then(|v| v.parse::<u64>().ok());

        let verify_interval_ms = env_nonempty("CYCLOPS_VERIFY_INTERVAL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_VERIFY_INTERVAL_MS);

        let tts_enabled = env_nonempty("CYCLOPS_TTS_ENABLED")
            .and_then(|v| v.to_lowercase().parse::<bool>().ok())
            .unwrap_or(DEFAULT_TTS_ENABLED);

        let log_level = env_nonempty("CYCLOPS_LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            provider,
            cloud_endpoint: env_nonempty("CYCLOPS_CLOUD_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_CLOUD_ENDPOINT.to_string()),
            cloud_model: env_nonempty("CYCLOPS_CLOUD_MODEL")
                .unwrap_or_else(|| DEFAULT_CLOUD_MODEL.to_string()),
            api_key: env_nonempty("OPENAI_API_KEY"),
            local_endpoint: env_nonempty("OLLAMA_HOST")
                .unwrap_or_else(|| DEFAULT_LOCAL_ENDPOINT.to_string()),
            local_model: env_nonempty("CYCLOPS_LOCAL_MODEL")
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            request_timeout_secs,
            verify_interval_ms,
            storage_dir: env_nonempty("CYCLOPS_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_storage_dir),
            tts_enabled,
            tts_voice: env_nonempty("CYCLOPS_TTS_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            log_level,
        }
    }
}

impl CyclopsConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for an out-of-range timeout, a
    /// zero verification interval or an unknown log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.request_timeout_secs {
            if timeout == 0 {
                return Err(ConfigError::ValidationFailed(
                    "Request timeout must be at least 1 second".to_string(),
                ));
            }
            if timeout > MAX_REQUEST_TIMEOUT_SECS {
                return Err(ConfigError::ValidationFailed(
                    "Request timeout cannot exceed 10 minutes".to_string(),
                ));
            }
        }

        if self.verify_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "Verification interval must be greater than zero".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// Backend description for the configured provider
    pub fn backend_config(&self) -> BackendConfig {
        match self.provider {
            Provider::Cloud => BackendConfig::Cloud {
                api_key: self.api_key.clone(),
                model: self.cloud_model.clone(),
                api_endpoint: Some(self.cloud_endpoint.clone()),
                timeout_seconds: self.request_timeout_secs,
                max_tokens: None,
            },
            Provider::Local => BackendConfig::Local {
                model: self.local_model.clone(),
                endpoint: self.local_endpoint.clone(),
                timeout_seconds: self.request_timeout_secs,
                max_tokens: None,
            },
        }
    }

    /// Creates the configured backend
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::BackendInitError` when the backend cannot be
    /// built, for example a cloud provider without `OPENAI_API_KEY`.
    pub fn create_backend(&self) -> Result<Arc<dyn ModelBackend>, ConfigError> {
        Ok(create_backend(&self.backend_config())?)
    }

    /// Speech synthesizer when TTS is enabled
    pub fn create_speech(&self) -> Result<Option<Arc<dyn SpeechSynthesizer>>, ConfigError> {
        if !self.tts_enabled {
            return Ok(None);
        }
        let speech = OpenAISpeech::new(self.api_key.clone(), Some(self.tts_voice.clone()))?
            .with_endpoint(self.cloud_endpoint.clone());
        Ok(Some(Arc::new(speech)))
    }

    pub fn rate_gate(&self) -> RateGate {
        RateGate::new(Duration::from_millis(self.verify_interval_ms))
    }

    pub fn lessons_file(&self) -> PathBuf {
        self.storage_dir.join("lessons.json")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.storage_dir.join("videos")
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.storage_dir.join("clips")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.storage_dir.join("audio")
    }

    fn model(&self) -> &str {
        match self.provider {
            Provider::Cloud => &self.cloud_model,
            Provider::Local => &self.local_model,
        }
    }

    fn endpoint(&self) -> &str {
        match self.provider {
            Provider::Cloud => &self.cloud_endpoint,
            Provider::Local => &self.local_endpoint,
        }
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("provider".to_string(), self.provider.to_string());
        map.insert("model".to_string(), self.model().to_string());
        map.insert("endpoint".to_string(), self.endpoint().to_string());
        map.insert(
            "api_key".to_string(),
            if self.api_key.is_some() { "set" } else { "not set" }.to_string(),
        );
        map.insert(
            "request_timeout_secs".to_string(),
            self.backend_config().timeout_seconds().to_string(),
        );
        map.insert(
            "verify_interval_ms".to_string(),
            self.verify_interval_ms.to_string(),
        );
        map.insert(
            "storage_dir".to_string(),
            self.storage_dir.display().to_string(),
        );
        map.insert("tts_enabled".to_string(), self.tts_enabled.to_string());
        map.insert("tts_voice".to_string(), self.tts_voice.clone());
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Debug for CyclopsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclopsConfig")
            .field("provider", &self.provider)
            .field("cloud_endpoint", &self.cloud_endpoint)
            .field("cloud_model", &self.cloud_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("local_endpoint", &self.local_endpoint)
            .field("local_model", &self.local_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("verify_interval_ms", &self.verify_interval_ms)
            .field("storage_dir", &self.storage_dir)
            .field("tts_enabled", &self.tts_enabled)
            .field("tts_voice", &self.tts_voice)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl fmt::Display for CyclopsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cyclops Configuration:")?;
        writeln!(f, "  Provider: {}", self.provider)?;
        writeln!(f, "  Model: {}", self.model())?;
        writeln!(f, "  Endpoint: {}", self.endpoint())?;
        writeln!(
            f,
            "  API Key: {}",
            if self.api_key.is_some() { "set" } else { "not set" }
        )?;
        writeln!(
            f,
            "  Request Timeout: {}s",
            self.backend_config().timeout_seconds()
        )?;
        writeln!(f, "  Verify Interval: {}ms", self.verify_interval_ms)?;
        writeln!(f, "  Storage Dir: {}", self.storage_dir.display())?;
        writeln!(f, "  TTS: {} ({})", self.tts_enabled, self.tts_voice)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        [
            "CYCLOPS_PROVIDER",
            "CYCLOPS_CLOUD_ENDPOINT",
            "CYCLOPS_CLOUD_MODEL",
            "OPENAI_API_KEY",
            "OLLAMA_HOST",
            "CYCLOPS_LOCAL_MODEL",
            "CYCLOPS_REQUEST_TIMEOUT",
            "CYCLOPS_VERIFY_INTERVAL_MS",
            "CYCLOPS_STORAGE_DIR",
            "CYCLOPS_TTS_ENABLED",
            "CYCLOPS_TTS_VOICE",
            "CYCLOPS_LOG_LEVEL",
        ]
        .iter()
        .map(|key| EnvGuard::unset(key))
        .collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = CyclopsConfig::default();

        assert_eq!(config.provider, Provider::Local);
        assert_eq!(config.local_model, DEFAULT_LOCAL_MODEL);
        assert_eq!(config.local_endpoint, DEFAULT_LOCAL_ENDPOINT);
        assert_eq!(config.cloud_model, DEFAULT_CLOUD_MODEL);
        assert!(config.api_key.is_none());
        assert!(config.request_timeout_secs.is_none());
        assert_eq!(config.verify_interval_ms, DEFAULT_VERIFY_INTERVAL_MS);
        assert!(!config.tts_enabled);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let mut guards = clean_env();
        guards.extend([
            EnvGuard::set("CYCLOPS_PROVIDER", "Cloud"),
            EnvGuard::set("CYCLOPS_CLOUD_MODEL", "gpt-4o-mini"),
            EnvGuard::set("OPENAI_API_KEY", "sk-test"),
            EnvGuard::set("CYCLOPS_REQUEST_TIMEOUT", "45"),
            EnvGuard::set("CYCLOPS_VERIFY_INTERVAL_MS", "1500"),
            EnvGuard::set("CYCLOPS_STORAGE_DIR", "/tmp/cyclops-test"),
            EnvGuard::set("CYCLOPS_TTS_ENABLED", "TRUE"),
            EnvGuard::set("CYCLOPS_LOG_LEVEL", "DEBUG"),
        ]);

        let config = CyclopsConfig::default();

        assert_eq!(config.provider, Provider::Cloud);
        assert_eq!(config.cloud_model, "gpt-4o-mini");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.request_timeout_secs, Some(45));
        assert_eq!(config.verify_interval_ms, 1500);
        assert_eq!(config.lessons_file(), PathBuf::from("/tmp/cyclops-test/lessons.json"));
        assert!(config.tts_enabled);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unknown_provider_falls_back_to_local() {
        let mut guards = clean_env();
        guards.push(EnvGuard::set("CYCLOPS_PROVIDER", "gemini"));

        assert_eq!(CyclopsConfig::default().provider, Provider::Local);
        assert!(matches!(
            "gemini".parse::<Provider>(),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    #[serial]
    fn test_backend_config_timeouts() {
        let _guards = clean_env();
        let mut config = CyclopsConfig::default();

        assert_eq!(config.backend_config().timeout_seconds(), 120);

        config.provider = Provider::Cloud;
        assert_eq!(config.backend_config().timeout_seconds(), 30);

        config.request_timeout_secs = Some(90);
        assert_eq!(config.backend_config().timeout_seconds(), 90);
    }

    #[test]
    #[serial]
    fn test_cloud_backend_without_key_fails() {
        let _guards = clean_env();
        let mut config = CyclopsConfig::default();
        config.provider = Provider::Cloud;

        assert!(matches!(
            config.create_backend(),
            Err(ConfigError::BackendInitError(
                BackendError::ConfigurationError { .. }
            ))
        ));
    }

    #[test]
    #[serial]
    fn test_speech_only_when_enabled() {
        let _guards = clean_env();
        let mut config = CyclopsConfig::default();
        assert!(config.create_speech().unwrap().is_none());

        config.tts_enabled = true;
        assert!(matches!(
            config.create_speech(),
            Err(ConfigError::SpeechInitError(_))
        ));

        config.api_key = Some("sk-test".to_string());
        assert!(config.create_speech().unwrap().is_some());
    }

    #[test]
    #[serial]
    fn test_configuration_validation() {
        let _guards = clean_env();
        let mut config = CyclopsConfig::default();

        config.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        config.request_timeout_secs = Some(601);
        assert!(config.validate().is_err());

        config.request_timeout_secs = None;
        config.verify_interval_ms = 0;
        assert!(config.validate().is_err());

        config.verify_interval_ms = 2000;
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_config_display_hides_key() {
        let _guards = clean_env();
        let mut config = CyclopsConfig::default();
        config.api_key = Some("sk-very-secret".to_string());

        let display = format!("{}", config);
        assert!(display.contains("Cyclops Configuration:"));
        assert!(display.contains("API Key: set"));
        assert!(!display.contains("sk-very-secret"));
        assert!(!format!("{:?}", config).contains("sk-very-secret"));
        assert_eq!(config.to_display_map()["api_key"], "set");
    }
}
