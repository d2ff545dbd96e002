use async_trait::async_trait;
use std::time::Duration;

use super::chat::{ChatClient, ChatRequest, ChatSettings};
use super::TranslationBackend;
use crate::app_config::{BackendConfig, BackendId};
use crate::errors::{BackendError, ConfigError};

/// NVIDIA integrate API base URL
pub const DEFAULT_ENDPOINT: &str = "https://integrate.api.nvidia.com/v1";

/// Riva Translate instruct model
pub const DEFAULT_MODEL: &str = "nvidia/riva-translate-4b-instruct-v1.1";

const SYSTEM_PROMPT: &str = "You are an expert at translating text from English to Arabic.";

// Sampling recommended for the Riva Translate prompt template
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_TOP_P: f32 = 0.7;

/// NVIDIA Riva Translate backend
#[derive(Debug, Clone)]
pub struct NvidiaBackend {
    client: ChatClient,
    settings: ChatSettings,
}

impl NvidiaBackend {
    /// Create a backend from its configuration, filling unset values with defaults
    pub fn new(config: &BackendConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = if config.endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            config.endpoint.as_str()
        };

        Ok(Self {
            client: ChatClient::new("NVIDIA", config.api_key.clone(), endpoint, timeout)?,
            settings: ChatSettings {
                model: if config.model.is_empty() {
                    DEFAULT_MODEL.to_string()
                } else {
                    config.model.clone()
                },
                temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                top_p: Some(config.top_p.unwrap_or(DEFAULT_TOP_P)),
            },
        })
    }

    /// Build the request for a text using the model's prompt template
    pub fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest::new(
            self.settings.model.clone(),
            SYSTEM_PROMPT,
            format!("What is the Arabic translation of the sentence: {}?", text),
        )
        .sampling(self.settings.temperature, self.settings.max_tokens, self.settings.top_p)
    }

    pub fn url(&self) -> &str {
        self.client.url()
    }
}

#[async_trait]
impl TranslationBackend for NvidiaBackend {
    fn id(&self) -> BackendId {
        BackendId::Nvidia
    }

    async fn translate(&self, text: &str) -> Result<String, BackendError> {
        let request = self.build_request(text);
        self.client.complete(&request).await
    }
}
