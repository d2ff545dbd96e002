/*!
 * Translation of a single cell through the backend chain.
 *
 * For each work item the text is normalized, sent to the primary backend
 * (with retries), cleaned and validated. When the call fails or the output
 * does not validate, the next backend in the chain gets the same text.
 * The first validated translation wins; otherwise the first unvalidated one
 * is kept and flagged; otherwise the cell is recorded as failed.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use super::model::{TranslationResult, WorkItem};
use super::preprocess::Preprocessor;
use super::rate_limiter::RateLimiter;
use super::retry::{translate_with_retry, RetryPolicy};
use crate::app_config::BackendId;
use crate::errors::{BackendError, FailureKind};
use crate::providers::TranslationBackend;
use crate::validation::{postprocess, Validator};

/// Result of translating one cell, plus what happened along the way
#[derive(Debug, Clone)]
pub struct CellOutcome {
    pub result: TranslationResult,
    /// A backend after the primary was called
    pub used_fallback: bool,
    /// Every backend call that ended in an error, in order
    pub backend_errors: Vec<(BackendId, FailureKind)>,
    /// Every configured backend has rejected our credentials
    pub auth_fatal: bool,
}

/// Translates cells using an ordered chain of backends
pub struct CellTranslator {
    backends: Vec<Arc<dyn TranslationBackend>>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    preprocessor: Preprocessor,
    validator: Validator,
    /// Backends that failed authentication; they are skipped from then on
    auth_failed: Mutex<HashSet<BackendId>>,
}

impl std::fmt::Debug for CellTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellTranslator")
            .field("backends", &self.backend_ids())
            .field("policy", &self.policy)
            .finish()
    }
}

impl CellTranslator {
    /// Create a translator; the first backend is the primary
    pub fn new(
        backends: Vec<Arc<dyn TranslationBackend>>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        preprocessor: Preprocessor,
        validator: Validator,
    ) -> Self {
        Self {
            backends,
            limiter,
            policy,
            preprocessor,
            validator,
            auth_failed: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend_ids(&self) -> Vec<BackendId> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Whether every backend in the chain has failed authentication
    pub fn all_backends_unauthorized(&self) -> bool {
        let failed = self.auth_failed.lock();
        !self.backends.is_empty() && self.backends.iter().all(|b| failed.contains(&b.id()))
    }

    /// Translate one cell; never fails, errors are recorded in the result
    pub async fn translate(&self, item: WorkItem) -> CellOutcome {
        let text = self.preprocessor.normalize(&item.source_text);
        let mut outcome = CellOutcome {
            result: TranslationResult {
                row_index: item.row_index,
                column_name: item.column_name.clone(),
                translated_text: None,
                backend_used: None,
                validation_passed: false,
                attempt_count: 0,
                error: None,
                error_kind: None,
            },
            used_fallback: false,
            backend_errors: Vec::new(),
            auth_fatal: false,
        };

        if text.is_empty() {
            warn!("{} is empty after preprocessing, skipping", item.cell_id());
            outcome.result.error = Some("source text is empty after preprocessing".to_string());
            return outcome;
        }

        // logged at debug level only
        Preprocessor::detect_issues(&text);

        // (backend, text, reason) of the first translation that failed validation
        let mut unvalidated: Option<(BackendId, String, String)> = None;
        // Auth errors are reported only when nothing else went wrong
        let mut last_error: Option<BackendError> = None;
        let mut last_auth_error: Option<BackendError> = None;

        for (position, backend) in self.backends.iter().enumerate() {
            let backend_id = backend.id();
            if self.auth_failed.lock().contains(&backend_id) {
                debug!("Skipping {} for {}: authentication failed earlier", backend_id, item.cell_id());
                continue;
            }
            if position > 0 {
                outcome.used_fallback = true;
                debug!("Falling back to {} for {}", backend_id, item.cell_id());
            }

            let attempted =
                translate_with_retry(backend.as_ref(), &text, &self.limiter, &self.policy).await;
            outcome.result.attempt_count += attempted.attempts;

            match attempted.outcome {
                Ok(raw) => {
                    let cleaned = postprocess(&raw);
                    let validation = self.validator.validate(&text, &cleaned);
                    match validation.reason() {
                        None => {
                            outcome.result.translated_text = Some(cleaned);
                            outcome.result.backend_used = Some(backend_id);
                            outcome.result.validation_passed = true;
                            return outcome;
                        }
                        Some(reason) => {
                            warn!(
                                "Validation failed for {} on {}: {}",
                                item.cell_id(),
                                backend_id,
                                reason
                            );
                            if unvalidated.is_none() {
                                unvalidated = Some((backend_id, cleaned, reason));
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!("{} failed for {}: {}", backend_id, item.cell_id(), error);
                    outcome.backend_errors.push((backend_id, error.kind()));
                    if error.kind() == FailureKind::AuthError {
                        self.auth_failed.lock().insert(backend_id);
                        last_auth_error = Some(error);
                    } else {
                        last_error = Some(error);
                    }
                }
            }
        }

        if let Some((backend_id, text, reason)) = unvalidated {
            outcome.result.translated_text = Some(text);
            outcome.result.backend_used = Some(backend_id);
            outcome.result.error = Some(reason);
            return outcome;
        }

        match last_error.or(last_auth_error) {
            Some(error) => {
                outcome.result.error_kind = Some(error.kind());
                outcome.result.error = Some(error.to_string());
            }
            None => {
                outcome.result.error_kind = Some(FailureKind::AuthError);
                outcome.result.error = Some("no backend with valid credentials left".to_string());
            }
        }
        outcome.auth_fatal = self.all_backends_unauthorized();
        outcome
    }
}
