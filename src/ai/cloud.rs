//! Hosted vision model client
//!
//! Talks to an OpenAI-compatible `/v1/chat/completions` endpoint. Frames are
//! sent as low-detail `image_url` parts carrying JPEG data URLs. The cloud
//! variant has a higher frame budget and a short timeout, and it refuses to
//! construct without a credential.
//!
//! # Example
//!
//! ```no_run
//! use cyclops::ai::{CloudBackend, ModelBackend, VisionRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = CloudBackend::new(Some("sk-...".to_string()), "gpt-4o".to_string(), None)?;
//!
//! let text = backend
//!     .analyze_frames(&[], VisionRequest::new("Describe the scene"))
//!     .await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

use crate::ai::backend::{request_error, BackendError, ModelBackend, CLOUD_FRAME_BUDGET};
use crate::ai::types::{data_url, VisionRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default request timeout for hosted API calls
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default hosted endpoint
pub const DEFAULT_CLOUD_ENDPOINT: &str = "https://api.openai.com";

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// OpenAI-compatible vision client
///
/// # Thread Safety
///
/// This client is thread-safe and can be shared across threads using `Arc`.
pub struct CloudBackend {
    /// API endpoint URL, without the `/v1/...` suffix
    endpoint: String,

    /// Model name to use for inference
    model: String,

    /// Bearer credential
    api_key: String,

    /// Shared HTTP client with connection pooling
    http_client: Client,

    /// Request timeout duration
    timeout: Duration,

    max_tokens: u32,
}

impl CloudBackend {
    /// Creates a cloud backend with the default timeout
    ///
    /// # Errors
    ///
    /// Returns `BackendError::ConfigurationError` when `api_key` is absent or blank.
    pub fn new(
        api_key: Option<String>,
        model: String,
        endpoint: Option<String>,
    ) -> Result<Self, BackendError> {
        Self::with_timeout(
            api_key,
            model,
            endpoint,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Creates a cloud backend with a custom timeout
    pub fn with_timeout(
        api_key: Option<String>,
        model: String,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BackendError::ConfigurationError {
                message: "OPENAI_API_KEY is required for the cloud backend".to_string(),
            })?;

        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        let endpoint = endpoint
            .unwrap_or_else(|| DEFAULT_CLOUD_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            endpoint,
            model,
            api_key,
            http_client,
            timeout,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, request: VisionRequest) -> ChatRequest {
        let mut messages = Vec::new();

        if let Some(system) = request.system {
            messages.push(Message {
                role: "system".to_string(),
                content: MessageContent::Text(system),
            });
        }

        let mut parts = vec![ContentPart::Text {
            text: request.prompt,
        }];
        parts.extend(request.images.iter().map(|frame| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: data_url(frame),
                detail: "low".to_string(),
            },
        }));

        messages.push(Message {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: Some(request.max_tokens.unwrap_or(self.max_tokens)),
            response_format: request.json_mode.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ModelBackend for CloudBackend {
    async fn complete(&self, request: VisionRequest) -> Result<String, BackendError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let image_count = request.images.len();
        let body = self.build_request(request);

        debug!(
            "Sending request to cloud model: model={}, images={}",
            self.model, image_count
        );

        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("cloud model", &self.endpoint, self.timeout, e))?;

        let elapsed = start.elapsed();
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();

            error!("Cloud model returned error status {}: {}", status, text);

            return Err(match status.as_u16() {
                401 | 403 => BackendError::AuthenticationError {
                    message: format!("HTTP {}: {}", status, text),
                },
                429 => BackendError::RateLimitError { retry_after },
                code => BackendError::ApiError {
                    message: format!("HTTP {}: {}", status, text),
                    status_code: Some(code),
                },
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse cloud model response: {}", e);
            BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: None,
            }
        })?;

        if let Some(usage) = &chat.usage {
            debug!(
                "Cloud usage: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "No content in cloud model response".to_string(),
                raw_response: None,
            })?;

        if content.trim().is_empty() {
            warn!("Cloud model returned an empty completion");
        }

        info!(
            "Cloud completion finished in {:.2}s (model={})",
            elapsed.as_secs_f64(),
            self.model
        );

        Ok(content)
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/v1/models", self.endpoint);

        debug!("Checking cloud model health at {}", url);

        match self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    return Err(BackendError::AuthenticationError {
                        message: format!("Credential rejected with status {}", status),
                    });
                }
                if !status.is_success() {
                    warn!("Cloud health check failed with status: {}", status);
                }
                Ok(status.is_success())
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!("Cannot reach cloud model at {}", self.endpoint);
                Ok(false)
            }
            Err(e) => Err(BackendError::NetworkError {
                message: format!("Health check failed: {}", e),
            }),
        }
    }

    fn name(&self) -> &str {
        "cloud"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model, self.endpoint))
    }

    fn frame_budget(&self) -> usize {
        CLOUD_FRAME_BUDGET
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for CloudBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

/// Request structure for the chat completions API
#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
