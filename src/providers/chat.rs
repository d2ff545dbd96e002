/*!
 * OpenAI-compatible chat completions client.
 *
 * Both NVIDIA and Fanar expose the same `/chat/completions` shape, so the
 * request/response types and the HTTP error classification live here.
 */

use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{BackendError, ConfigError};

/// Longest error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Chat completions request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// The model to use
    pub model: String,

    /// The messages for the conversation
    pub messages: Vec<ChatMessage>,

    /// Temperature for generation
    pub temperature: f32,

    /// Maximum number of tokens to generate
    pub max_tokens: u32,

    /// Top probability mass to consider (nucleus sampling)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    pub stream: bool,
}

impl ChatRequest {
    /// Create a request with a system prompt and one user message
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(system.into()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(user.into()),
                },
            ],
            temperature: 0.0,
            max_tokens: 512,
            top_p: None,
            stream: false,
        }
    }

    /// Set the sampling parameters
    pub fn sampling(mut self, temperature: f32, max_tokens: u32, top_p: Option<f32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self.top_p = top_p;
        self
    }
}

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completions response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// Individual choice in a chat completions response
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    /// Content of the first choice, if non-empty
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|content| !content.trim().is_empty())
    }
}

/// Model and sampling settings resolved for one backend
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

/// HTTP client for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Full chat completions URL
    url: String,
    /// Name used in log messages
    label: &'static str,
}

impl ChatClient {
    /// Create a new client
    ///
    /// `endpoint` may be a base URL (`.../v1`) or the full completions URL.
    pub fn new(
        label: &'static str,
        api_key: impl Into<String>,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            url: completions_url(endpoint),
            label,
        })
    }

    /// Full URL requests are sent to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a request and return the first choice's content
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        debug!("Sending {} request to {}", self.label, self.url);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json; charset=utf-8")
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| classify_transport_error(self.label, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(self.label, e))?;

        if !status.is_success() {
            error!("{} API error ({}): {}", self.label, status, truncate(&body));
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::MalformedResponse(format!("{} response is not valid JSON: {}", self.label, e))
        })?;

        parsed.first_content().map(str::to_string).ok_or_else(|| {
            BackendError::MalformedResponse(format!("{} response has no message content", self.label))
        })
    }
}

/// Append `/chat/completions` unless the endpoint already points there
pub fn completions_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.ends_with("/chat/completions") {
        endpoint.to_string()
    } else {
        format!("{}/chat/completions", endpoint)
    }
}

/// Map an HTTP error status to a backend error
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout(message),
        s if s.is_server_error() => BackendError::Unknown {
            message,
            transient: true,
        },
        _ => BackendError::Unknown {
            message,
            transient: false,
        },
    }
}

fn classify_transport_error(label: &str, error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(format!("{} request timed out: {}", label, error))
    } else if error.is_decode() {
        BackendError::MalformedResponse(format!("{} response could not be decoded: {}", label, error))
    } else {
        // Connection resets and refused connections are usually temporary
        BackendError::Unknown {
            message: format!("{} request failed: {}", label, error),
            transient: true,
        }
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    }
}
