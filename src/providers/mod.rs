/*!
 * Translation backends.
 *
 * This module contains the clients for the supported translation services:
 * - NVIDIA: Riva Translate instruct model behind NVIDIA's OpenAI-compatible API
 * - Fanar: Fanar chat completions API
 * - Mock: scripted backend for tests
 *
 * The pipeline only sees the `TranslationBackend` trait.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{BackendConfig, BackendId, Config};
use crate::errors::{BackendError, ConfigError};

/// Common trait for all translation backends
///
/// Implementations make exactly one request per call. Retries, backoff and
/// rate limiting are applied by the caller.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Which backend this is
    fn id(&self) -> BackendId;

    /// Translate English text to Arabic
    ///
    /// # Arguments
    /// * `text` - Preprocessed English source text
    ///
    /// # Returns
    /// * `Result<String, BackendError>` - The raw Arabic text or a classified failure
    async fn translate(&self, text: &str) -> Result<String, BackendError>;

    /// Test the connection with a one-word translation
    async fn test_connection(&self) -> Result<(), BackendError> {
        self.translate("Hello").await.map(|_| ())
    }
}

/// Build the HTTP backend for `id` from its configuration
pub fn build_backend(
    id: BackendId,
    config: &BackendConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn TranslationBackend>, ConfigError> {
    if config.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "missing API key for {} (set apis.{}.api_key or {})",
            id.display_name(),
            id,
            Config::api_key_env_var(id)
        )));
    }

    let backend: Arc<dyn TranslationBackend> = match id {
        BackendId::Nvidia => Arc::new(nvidia::NvidiaBackend::new(config, request_timeout)?),
        BackendId::Fanar => Arc::new(fanar::FanarBackend::new(config, request_timeout)?),
    };
    Ok(backend)
}

/// Build the backends of the configured chain, primary first
pub fn build_backend_chain(config: &Config) -> Result<Vec<Arc<dyn TranslationBackend>>, ConfigError> {
    let timeout = Duration::from_secs(config.retry.request_timeout);
    config
        .translation
        .backend_chain()
        .into_iter()
        .map(|id| build_backend(id, config.apis.get(id), timeout))
        .collect()
}

pub mod chat;
pub mod fanar;
pub mod mock;
pub mod nvidia;

pub use mock::{MockBackend, MockBehavior};
