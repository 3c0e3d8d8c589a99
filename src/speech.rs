//! Spoken instructions
//!
//! The extraction pipeline can attach an audio rendition of each step's
//! instruction. Synthesis is best effort: one failed step never aborts the
//! others.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default hosted speech endpoint
pub const DEFAULT_SPEECH_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1";
pub const DEFAULT_VOICE: &str = "nova";

const SPEECH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech synthesis is not configured: {0}")]
    NotConfigured(String),

    #[error("Nothing to say")]
    EmptyText,

    #[error("Speech request failed: {0}")]
    Request(String),

    #[error("Speech API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns text into encoded audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns MP3 bytes for `text`
    async fn generate(&self, text: &str) -> Result<Vec<u8>, SpeechError>;

    /// File extension of the produced audio
    fn extension(&self) -> &str {
        "mp3"
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI-compatible `/v1/audio/speech` client
pub struct OpenAISpeech {
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    http_client: Client,
}

impl fmt::Debug for OpenAISpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAISpeech")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAISpeech {
    pub fn new(api_key: Option<String>, voice: Option<String>) -> Result<Self, SpeechError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SpeechError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(SPEECH_TIMEOUT_SECS))
            .build()
            .map_err(|e| SpeechError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: DEFAULT_SPEECH_ENDPOINT.to_string(),
            api_key,
            model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            http_client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeech {
    async fn generate(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let url = format!("{}/v1/audio/speech", self.endpoint);
        let body = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: text,
            response_format: "mp3",
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;
        debug!("Synthesized {} bytes of speech", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credential() {
        assert!(matches!(
            OpenAISpeech::new(None, None),
            Err(SpeechError::NotConfigured(_))
        ));
        assert!(matches!(
            OpenAISpeech::new(Some("  ".to_string()), None),
            Err(SpeechError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_defaults_and_debug_redaction() {
        let speech = OpenAISpeech::new(Some("sk-secret".to_string()), None)
            .unwrap()
            .with_endpoint("http://localhost:9999/");
        assert_eq!(speech.voice(), DEFAULT_VOICE);
        assert_eq!(speech.extension(), "mp3");

        let debug = format!("{:?}", speech);
        assert!(debug.contains("http://localhost:9999\""));
        assert!(!debug.contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_locally() {
        let speech = OpenAISpeech::new(Some("sk".to_string()), Some("alloy".to_string())).unwrap();
        assert!(matches!(speech.generate("   ").await, Err(SpeechError::EmptyText)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let speech = OpenAISpeech::new(Some("sk".to_string()), None)
            .unwrap()
            .with_endpoint("http://127.0.0.1:1");
        assert!(matches!(
            speech.generate("Hello").await,
            Err(SpeechError::Request(_))
        ));
    }
}
