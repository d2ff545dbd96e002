/*!
 * Mock backend implementations for testing.
 *
 * This module provides a scripted backend that simulates different behaviors:
 * - `MockBackend::working()` - Always succeeds with Arabic text
 * - `MockBackend::failing()` - Always fails with the given error
 * - `MockBackend::fail_first()` - Fails a number of times, then succeeds
 * - `MockBackend::non_arabic()` - Succeeds with text that fails validation
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::TranslationBackend;
use crate::app_config::BackendId;
use crate::errors::BackendError;

/// Letters used to fake translations; free of Alef variants so postprocessing keeps them intact
const FAKE_ARABIC: &[char] = &[
    'ب', 'ت', 'ث', 'ج', 'ح', 'خ', 'د', 'ذ', 'ر', 'ز', 'س', 'ش', 'ص', 'ض', 'ط', 'ظ', 'ع', 'غ', 'ف', 'ق',
    'ك', 'ل', 'م', 'ن', 'ه', 'و', 'ي',
];

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a fake Arabic rendering of the input
    Working,
    /// Always fails with the given error
    Failing(BackendError),
    /// Fails `failures` times with the given error, then works
    FailFirst { failures: usize, error: BackendError },
    /// Succeeds with the input echoed back untranslated
    NonArabic,
    /// Simulates slow responses (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Hook invoked with the 1-based call number before each response
pub type CallHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Mock backend for testing translation behavior
#[derive(Clone)]
pub struct MockBackend {
    id: BackendId,
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Texts received, in call order
    received: Arc<Mutex<Vec<String>>>,
    on_call: Option<CallHook>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("id", &self.id)
            .field("behavior", &self.behavior)
            .field("request_count", &self.request_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(id: BackendId, behavior: MockBehavior) -> Self {
        Self {
            id,
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
            on_call: None,
        }
    }

    pub fn working(id: BackendId) -> Self {
        Self::new(id, MockBehavior::Working)
    }

    pub fn failing(id: BackendId, error: BackendError) -> Self {
        Self::new(id, MockBehavior::Failing(error))
    }

    pub fn fail_first(id: BackendId, failures: usize, error: BackendError) -> Self {
        Self::new(id, MockBehavior::FailFirst { failures, error })
    }

    pub fn non_arabic(id: BackendId) -> Self {
        Self::new(id, MockBehavior::NonArabic)
    }

    /// Run `hook` on every call, before the response is produced
    pub fn with_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Texts received so far
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Deterministic fake translation: one Arabic letter per visible character
    pub fn fake_translation(text: &str) -> String {
        text.chars()
            .map(|c| {
                if c.is_whitespace() {
                    c
                } else {
                    FAKE_ARABIC[(c as usize) % FAKE_ARABIC.len()]
                }
            })
            .collect()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    async fn translate(&self, text: &str) -> Result<String, BackendError> {
        let call = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.received.lock().push(text.to_string());
        if let Some(hook) = &self.on_call {
            hook(call);
        }

        match &self.behavior {
            MockBehavior::Working => Ok(Self::fake_translation(text)),
            MockBehavior::Failing(error) => Err(error.clone()),
            MockBehavior::FailFirst { failures, error } => {
                if call <= *failures {
                    Err(error.clone())
                } else {
                    Ok(Self::fake_translation(text))
                }
            }
            MockBehavior::NonArabic => Ok(text.to_string()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Ok(Self::fake_translation(text))
            }
        }
    }
}
