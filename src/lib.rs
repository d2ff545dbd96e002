/*!
 * # dataset-translator
 *
 * Translates the text columns of a tabular dataset from English to Arabic
 * using LLM chat-completion services.
 *
 * ## Features
 *
 * - CSV, TSV, JSON, JSONL and Parquet input; CSV, JSON and Parquet output
 * - NVIDIA and Fanar backends with automatic fallback
 * - Per-backend requests-per-minute limiting and retry with backoff
 * - Validation of the Arabic output with the result recorded per cell
 * - SQLite checkpoints so an interrupted run resumes where it stopped
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `dataset`: Loading and writing tables
 * - `providers`: Backend trait and the HTTP clients
 * - `translation`: Preprocessing, rate limiting, retry and the pipeline
 * - `validation`: Postprocessing and validation of translations
 * - `checkpoint`: Checkpoint stores (SQLite and in-memory)
 * - `database`: SQLite access used by the checkpoint store
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

use std::path::Path;

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod checkpoint;
pub mod database;
pub mod dataset;
pub mod errors;
pub mod file_utils;
pub mod providers;
pub mod translation;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::{BackendId, Config};
pub use app_controller::Controller;
pub use dataset::Table;
pub use errors::{BackendError, CheckpointError, ConfigError, DatasetError, FailureKind, PipelineError};
pub use translation::{RunReport, RunStatistics, RunStatus};

/// Translate the dataset named in `config`
pub async fn run(config: Config) -> Result<RunReport, PipelineError> {
    Controller::with_config(config)?.quiet().run().await
}

/// Continue the run checkpointed in `checkpoint_dir`
///
/// `config` must describe the same dataset, columns and limit as the
/// interrupted run; otherwise the checkpoint is rejected.
pub async fn resume<P: AsRef<Path>>(checkpoint_dir: P, config: Config) -> Result<RunReport, PipelineError> {
    Controller::with_config(config)?.quiet().resume(checkpoint_dir).await
}
