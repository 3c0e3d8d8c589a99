//! Vision model backend abstraction
//!
//! This module provides the core trait and types for the generative model
//! backends. A backend exposes three capabilities: whole-video analysis,
//! live frame analysis, and overlay generation. Each capability is a single
//! request/response exchange returning the model's raw text, which callers
//! hand to the response parser.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::ai::types::{most_recent, spread_evenly, VisionRequest};

/// Errors that can occur during backend operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in seconds)
    TimeoutError { seconds: u64 },

    /// Provider-side rate limit exceeded, retry after the specified duration (in seconds)
    RateLimitError { retry_after: Option<u64> },

    /// Invalid or malformed response envelope from the provider
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Configuration error (missing credential, invalid settings, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::TimeoutError { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from model: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Maps a transport-level reqwest failure onto the backend error taxonomy
pub(crate) fn request_error(
    provider: &str,
    endpoint: &str,
    timeout: Duration,
    e: reqwest::Error,
) -> BackendError {
    if e.is_timeout() {
        tracing::error!("{} request timed out after {:?}", provider, timeout);
        BackendError::TimeoutError {
            seconds: timeout.as_secs(),
        }
    } else if e.is_connect() {
        tracing::error!("Cannot connect to {} at {}", provider, endpoint);
        BackendError::NetworkError {
            message: format!("Connection failed: {}", e),
        }
    } else {
        tracing::error!("{} request error: {}", provider, e);
        BackendError::NetworkError {
            message: format!("Request failed: {}", e),
        }
    }
}

/// Number of frames the cloud backend accepts per video analysis
pub const CLOUD_FRAME_BUDGET: usize = 20;

/// Number of frames the local backend accepts per video analysis
pub const LOCAL_FRAME_BUDGET: usize = 10;

/// Live verification never sends more than this many frames
pub const VERIFICATION_FRAME_LIMIT: usize = 5;

/// Configuration for the two backend variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Hosted OpenAI-compatible vision model
    Cloud {
        /// API key for authentication; required
        api_key: Option<String>,
        /// Model to use (e.g., "gpt-4o")
        model: String,
        /// Optional API endpoint override (for testing or proxies)
        api_endpoint: Option<String>,
        /// Request timeout in seconds (default: 30)
        timeout_seconds: Option<u64>,
        /// Maximum tokens for response
        max_tokens: Option<u32>,
    },

    /// Local Ollama vision model
    Local {
        /// Model name (e.g., "llama3.2-vision")
        model: String,
        /// Local API endpoint (e.g., "http://localhost:11434")
        endpoint: String,
        /// Request timeout in seconds (default: 120)
        timeout_seconds: Option<u64>,
        /// Maximum tokens for response
        max_tokens: Option<u32>,
    },
}

impl BackendConfig {
    /// Returns the timeout in seconds for this configuration
    pub fn timeout_seconds(&self) -> u64 {
        match self {
            BackendConfig::Cloud {
                timeout_seconds, ..
            } => timeout_seconds.unwrap_or(30),
            BackendConfig::Local {
                timeout_seconds, ..
            } => timeout_seconds.unwrap_or(120),
        }
    }

    /// Returns the model identifier for this configuration
    pub fn model_name(&self) -> &str {
        match self {
            BackendConfig::Cloud { model, .. } => model,
            BackendConfig::Local { model, .. } => model,
        }
    }

    /// Frames per video analysis call
    pub fn frame_budget(&self) -> usize {
        match self {
            BackendConfig::Cloud { .. } => CLOUD_FRAME_BUDGET,
            BackendConfig::Local { .. } => LOCAL_FRAME_BUDGET,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            BackendConfig::Cloud { .. } => "cloud",
            BackendConfig::Local { .. } => "local",
        }
    }
}

/// Core trait that all vision model backends implement
///
/// Implementors provide [`ModelBackend::complete`], a single multimodal
/// exchange. The three capability methods shape frames and request flags on
/// top of it and can be overridden when a provider needs something special.
///
/// # Example
///
/// ```ignore
/// use cyclops::ai::{ModelBackend, VisionRequest};
///
/// async fn describe(backend: &dyn ModelBackend, frames: &[String]) {
///     let request = VisionRequest::new("What is happening?").with_temperature(0.2);
///     match backend.analyze_video(frames, request).await {
///         Ok(text) => println!("{}", text),
///         Err(e) => eprintln!("{} failed: {}", backend.name(), e),
///     }
/// }
/// ```
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Sends one prompt with its images and returns the raw model text
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the provider is unreachable, times out,
    /// rejects the credential or returns an unusable envelope.
    async fn complete(&self, request: VisionRequest) -> Result<String, BackendError>;

    /// Analyzes a sampled video; frames beyond the budget are thinned evenly
    async fn analyze_video(
        &self,
        frames: &[String],
        request: VisionRequest,
    ) -> Result<String, BackendError> {
        let images = spread_evenly(frames, self.frame_budget());
        self.complete(request.with_images(images).json()).await
    }

    /// Analyzes a short, temporally ordered burst of live frames
    async fn analyze_frames(
        &self,
        frames: &[String],
        request: VisionRequest,
    ) -> Result<String, BackendError> {
        let images = most_recent(frames, VERIFICATION_FRAME_LIMIT);
        self.complete(request.with_images(images).json()).await
    }

    /// Generates a corrective overlay, optionally grounded on the current frame
    async fn generate_overlay(
        &self,
        request: VisionRequest,
        frame: Option<&str>,
    ) -> Result<String, BackendError> {
        let images = frame.map(|f| vec![f.to_string()]).unwrap_or_default();
        self.complete(request.with_images(images).json()).await
    }

    /// Checks whether the backend can currently serve requests
    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(true)
    }

    /// Returns the human-readable name of this backend
    fn name(&self) -> &str;

    /// Returns optional model information for this backend
    fn model_info(&self) -> Option<String> {
        None
    }

    /// Maximum frames sent per video analysis
    fn frame_budget(&self) -> usize;

    /// Per-request timeout
    fn timeout(&self) -> Duration;
}
