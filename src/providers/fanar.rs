use async_trait::async_trait;
use std::time::Duration;

use super::chat::{ChatClient, ChatRequest, ChatSettings};
use super::TranslationBackend;
use crate::app_config::{BackendConfig, BackendId};
use crate::errors::{BackendError, ConfigError};

/// Fanar API base URL
pub const DEFAULT_ENDPOINT: &str = "https://api.fanar.qa/v1";

pub const DEFAULT_MODEL: &str = "Fanar";

const SYSTEM_PROMPT: &str = "You are an expert translator. Translate the following English text to fluent, natural Arabic. Provide only the translation without any explanations.";

const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Fanar chat completions backend
#[derive(Debug, Clone)]
pub struct FanarBackend {
    client: ChatClient,
    settings: ChatSettings,
}

impl FanarBackend {
    /// Create a backend from its configuration, filling unset values with defaults
    pub fn new(config: &BackendConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = if config.endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            config.endpoint.as_str()
        };

        Ok(Self {
            client: ChatClient::new("Fanar", config.api_key.clone(), endpoint, timeout)?,
            settings: ChatSettings {
                model: if config.model.is_empty() {
                    DEFAULT_MODEL.to_string()
                } else {
                    config.model.clone()
                },
                temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                top_p: config.top_p,
            },
        })
    }

    pub fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest::new(
            self.settings.model.clone(),
            SYSTEM_PROMPT,
            format!("Translate to Arabic: {}", text),
        )
        .sampling(self.settings.temperature, self.settings.max_tokens, self.settings.top_p)
    }

    pub fn url(&self) -> &str {
        self.client.url()
    }
}

#[async_trait]
impl TranslationBackend for FanarBackend {
    fn id(&self) -> BackendId {
        BackendId::Fanar
    }

    async fn translate(&self, text: &str) -> Result<String, BackendError> {
        let request = self.build_request(text);
        let content = self.client.complete(&request).await?;
        Ok(content.trim().to_string())
    }
}
