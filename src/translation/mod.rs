/*!
 * Cell translation and the pipeline that drives it.
 *
 * - `model`: cell identities, work items and results
 * - `preprocess`: normalization of source text
 * - `rate_limiter`: per-backend requests-per-minute throttle
 * - `retry`: retry policy with exponential backoff
 * - `cell`: one cell through the backend chain with fallback
 * - `stats`: run statistics
 * - `pipeline`: the resumable pipeline state machine
 */

// Re-export main types for easier usage
pub use self::cell::{CellOutcome, CellTranslator};
pub use self::model::{CellId, CellStatus, TranslationResult, WorkItem};
pub use self::pipeline::{
    OutputTarget, Pipeline, PipelineOptions, PipelineState, RunReport, RunStatus, StopSignal,
};
pub use self::preprocess::Preprocessor;
pub use self::rate_limiter::RateLimiter;
pub use self::retry::{translate_with_retry, RetryPolicy};
pub use self::stats::RunStatistics;

// Submodules
pub mod cell;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod rate_limiter;
pub mod retry;
pub mod stats;
