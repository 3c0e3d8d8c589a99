//! Ollama HTTP client for local vision inference
//!
//! Uses the native `/api/chat` endpoint, attaching frames through the
//! per-message `images` array. Local models are slower and accept fewer
//! frames, so the local variant has a smaller budget and a much longer
//! timeout than the cloud one. No credential is needed.

use crate::ai::backend::{request_error, BackendError, ModelBackend, LOCAL_FRAME_BUDGET};
use crate::ai::types::{raw_base64, VisionRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default request timeout for Ollama API calls
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default Ollama endpoint
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434";

/// Default local vision model
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2-vision";

/// Ollama client for local vision inference
///
/// # Configuration
///
/// - **endpoint**: Ollama API endpoint (e.g., "http://localhost:11434")
/// - **model**: Vision-capable model name (e.g., "llama3.2-vision", "llava")
/// - **timeout**: Request timeout duration
pub struct LocalBackend {
    endpoint: String,
    model: String,
    http_client: Client,
    timeout: Duration,
    max_tokens: Option<u32>,
}

impl LocalBackend {
    /// Creates a new local backend with the default timeout
    pub fn new(endpoint: String, model: String) -> Result<Self, BackendError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new local backend with a custom timeout
    pub fn with_timeout(
        endpoint: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            http_client,
            timeout,
            max_tokens: None,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request(&self, request: VisionRequest) -> OllamaChatRequest {
        let mut messages = Vec::new();

        if let Some(system) = request.system {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system,
                images: None,
            });
        }

        let images: Vec<String> = request
            .images
            .iter()
            .map(|frame| raw_base64(frame).to_string())
            .collect();

        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: request.prompt,
            images: (!images.is_empty()).then_some(images),
        });

        OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            format: request.json_mode.then(|| "json".to_string()),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens.or(self.max_tokens),
            },
        }
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    async fn complete(&self, request: VisionRequest) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.endpoint);
        let image_count = request.images.len();
        let body = self.build_request(request);

        debug!(
            "Sending request to Ollama: model={}, images={}",
            self.model, image_count
        );

        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("Ollama", &self.endpoint, self.timeout, e))?;

        let elapsed = start.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            error!("Ollama API returned error status {}: {}", status, text);

            if status.as_u16() == 404 && text.contains("model") {
                return Err(BackendError::Other {
                    message: format!(
                        "Model '{}' not found. Please pull it with: ollama pull {}",
                        self.model, self.model
                    ),
                });
            }

            return Err(BackendError::ApiError {
                message: format!("HTTP {}: {}", status, text),
                status_code: Some(status.as_u16()),
            });
        }

        let chat: OllamaChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Ollama response: {}", e);
            BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: None,
            }
        })?;

        if !chat.done {
            warn!("Ollama response indicates incomplete generation");
        }

        info!(
            "Ollama generation completed in {:.2}s (model={})",
            elapsed.as_secs_f64(),
            self.model
        );

        debug!(
            "Ollama stats: prompt_tokens={}, eval_tokens={}, total_duration={:?}",
            chat.prompt_eval_count.unwrap_or(0),
            chat.eval_count.unwrap_or(0),
            chat.total_duration
        );

        Ok(chat.message.map(|m| m.content).unwrap_or_default())
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/api/tags", self.endpoint);

        debug!("Checking Ollama health at {}", url);

        match self.http_client.get(&url).send().await {
            Ok(response) => {
                let is_healthy = response.status().is_success();
                if is_healthy {
                    info!("Ollama health check successful");
                } else {
                    warn!(
                        "Ollama health check failed with status: {}",
                        response.status()
                    );
                }
                Ok(is_healthy)
            }
            Err(e) => {
                if e.is_timeout() {
                    warn!("Ollama health check timed out");
                    Ok(false)
                } else if e.is_connect() {
                    warn!("Cannot connect to Ollama at {}", self.endpoint);
                    Ok(false)
                } else {
                    error!("Ollama health check error: {}", e);
                    Err(BackendError::NetworkError {
                        message: format!("Health check failed: {}", e),
                    })
                }
            }
        }
    }

    fn name(&self) -> &str {
        "local"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model, self.endpoint))
    }

    fn frame_budget(&self) -> usize {
        LOCAL_FRAME_BUDGET
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Request structure for Ollama's chat API
#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: OllamaOptions,
}

/// Response structure from Ollama's chat API
#[derive(Debug, Clone, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    total_duration: Option<u64>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> LocalBackend {
        LocalBackend::new(
            DEFAULT_LOCAL_ENDPOINT.to_string(),
            DEFAULT_LOCAL_MODEL.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let backend = backend();
        assert_eq!(backend.name(), "local");
        assert_eq!(backend.frame_budget(), 10);
        assert_eq!(backend.timeout(), Duration::from_secs(120));
        assert_eq!(
            backend.model_info().unwrap(),
            "llama3.2-vision @ http://localhost:11434"
        );
    }

    #[test]
    fn test_custom_timeout() {
        let timeout = Duration::from_secs(300);
        let backend =
            LocalBackend::with_timeout("http://gpu-box:11434/".to_string(), "llava".to_string(), timeout)
                .unwrap();
        assert_eq!(backend.timeout(), timeout);
        assert_eq!(backend.endpoint, "http://gpu-box:11434");
    }

    #[test]
    fn test_request_serialization() {
        let request = VisionRequest::new("Is the step done?")
            .with_system("You are a patient teacher")
            .with_images(vec![
                "data:image/jpeg;base64,AAAA".to_string(),
                "BBBB".to_string(),
            ])
            .with_temperature(0.1)
            .json();

        let json = serde_json::to_value(backend().build_request(request)).unwrap();

        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][0].get("images").is_none());
        assert_eq!(json["messages"][1]["images"][0], "AAAA");
        assert_eq!(json["messages"][1]["images"][1], "BBBB");
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_response_parsing() {
        let response_json = r#"{
            "model": "llama3.2-vision",
            "message": {"role": "assistant", "content": "{\"status\":\"complete\"}"},
            "done": true,
            "total_duration": 5000000,
            "prompt_eval_count": 40,
            "eval_count": 12
        }"#;

        let response: OllamaChatResponse = serde_json::from_str(response_json).unwrap();
        assert!(response.done);
        assert_eq!(
            response.message.unwrap().content,
            "{\"status\":\"complete\"}"
        );
        assert_eq!(response.eval_count, Some(12));
    }
}
