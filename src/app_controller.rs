use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{BackendId, ColumnSelection, Config};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
use crate::dataset::{DatasetLoader, LocalFileLoader, Table};
use crate::errors::{BackendError, ConfigError, PipelineError};
use crate::file_utils::FileManager;
use crate::providers::{build_backend_chain, TranslationBackend};
use crate::translation::{
    CellTranslator, OutputTarget, Pipeline, PipelineOptions, Preprocessor, RateLimiter, RetryPolicy,
    RunReport, StopSignal,
};
use crate::validation::Validator;

// @module: Application controller for dataset translation

/// Main application controller for dataset translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Backends to use instead of the configured HTTP clients
    backends: Option<Vec<Arc<dyn TranslationBackend>>>,
    // @field: Show a progress bar and listen for Ctrl-C
    interactive: bool,
    stop: StopSignal,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            backends: None,
            interactive: true,
            stop: StopSignal::new(),
        })
    }

    /// Use these backends, primary first, instead of building HTTP clients
    pub fn with_backends(mut self, backends: Vec<Arc<dyn TranslationBackend>>) -> Self {
        self.backends = Some(backends);
        self
    }

    /// No progress bar and no signal handler
    pub fn quiet(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Signal that stops the run between cells
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run the configured translation
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let start_time = std::time::Instant::now();

        let mut table = LocalFileLoader.load(&self.config.dataset.source)?;
        if let Some(limit) = self.config.dataset.limit {
            if limit < table.row_count() {
                info!("Limiting dataset to the first {} of {} rows", limit, table.row_count());
                table.truncate(limit);
            }
        }

        let columns = self.resolve_columns(&table)?;
        let translator = Arc::new(self.build_translator()?);
        let store = self.open_store().await?;
        let options = self.pipeline_options();

        info!(
            "Translating {} with {} (fallback: {})",
            self.config.dataset.source,
            self.config.translation.primary_api.display_name(),
            if self.config.translation.enable_fallback { "on" } else { "off" }
        );

        let progress_bar = self.progress_bar();
        let pb = progress_bar.clone();
        let mut pipeline = Pipeline::new(translator, store, options)
            .with_stop_signal(self.stop.clone())
            .with_progress(move |done, total| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            });

        let interrupt_handler = self.interactive.then(|| self.spawn_interrupt_handler());
        let result = pipeline.run(&table, &columns).await;
        if let Some(handler) = interrupt_handler {
            handler.abort();
        }
        progress_bar.finish_and_clear();

        let report = result?;
        info!("{}", report.stats.summary());
        if let Some(path) = &report.output_path {
            info!("Success: {}", path.display());
        }
        info!("Total processing time: {}", Self::format_duration(start_time.elapsed()));
        Ok(report)
    }

    /// Resume the run whose checkpoint is stored in `checkpoint_dir`
    pub async fn resume<P: AsRef<Path>>(&self, checkpoint_dir: P) -> Result<RunReport, PipelineError> {
        let mut config = self.config.clone();
        config.checkpoint.enabled = true;
        config.checkpoint.resume = true;
        config.checkpoint.directory = checkpoint_dir.as_ref().to_path_buf();

        let controller = Self {
            config,
            backends: self.backends.clone(),
            interactive: self.interactive,
            stop: self.stop.clone(),
        };
        controller.run().await
    }

    /// Send a one-word translation to every configured backend
    pub async fn check_connections(&self) -> Result<Vec<(BackendId, Result<(), BackendError>)>, ConfigError> {
        let mut results = Vec::new();
        for backend in self.backends()? {
            let outcome = backend.test_connection().await;
            match &outcome {
                Ok(()) => info!("{}: connection OK", backend.id().display_name()),
                Err(e) => warn!("{}: {}", backend.id().display_name(), e),
            }
            results.push((backend.id(), outcome));
        }
        Ok(results)
    }

    fn backends(&self) -> Result<Vec<Arc<dyn TranslationBackend>>, ConfigError> {
        match &self.backends {
            Some(backends) => Ok(backends.clone()),
            None => build_backend_chain(&self.config),
        }
    }

    fn build_translator(&self) -> Result<CellTranslator, ConfigError> {
        let limiter = RateLimiter::from_config(&self.config)?;
        let preprocessor = Preprocessor::new(
            self.config.translation.normalize_provider_terms,
            &self.config.translation.provider_terms,
        )?;

        Ok(CellTranslator::new(
            self.backends()?,
            Arc::new(limiter),
            RetryPolicy::from_config(&self.config.retry),
            preprocessor,
            Validator::new(&self.config.validation),
        ))
    }

    /// Configured columns, or the detected text columns for "auto"
    fn resolve_columns(&self, table: &Table) -> Result<Vec<String>, PipelineError> {
        match &self.config.dataset.columns_to_translate {
            ColumnSelection::Named(columns) => Ok(columns.clone()),
            ColumnSelection::Auto(_) => {
                let columns = table.text_columns();
                if columns.is_empty() {
                    return Err(ConfigError::Invalid(
                        "no text columns detected; set dataset.columns_to_translate".to_string(),
                    )
                    .into());
                }
                info!("Auto-detected text columns: {}", columns.join(", "));
                Ok(columns)
            }
        }
    }

    async fn open_store(&self) -> Result<Box<dyn CheckpointStore>, PipelineError> {
        if !self.config.checkpoint.enabled {
            debug!("Checkpointing disabled, results are kept in memory");
            return Ok(Box::new(MemoryCheckpointStore::new()));
        }
        let store = SqliteCheckpointStore::open(&self.config.checkpoint.directory).await?;
        Ok(Box::new(store))
    }

    fn output_path(&self) -> PathBuf {
        match &self.config.output.path {
            Some(path) => path.clone(),
            None => FileManager::generate_output_path(&self.config.dataset.source, self.config.output.format),
        }
    }

    fn pipeline_options(&self) -> PipelineOptions {
        let path = self.output_path();
        let statistics_path = self
            .config
            .output
            .save_statistics
            .then(|| FileManager::statistics_path(&path));

        PipelineOptions {
            checkpoint_interval: self.config.checkpoint.interval,
            checkpointing: self.config.checkpoint.enabled,
            resume: self.config.checkpoint.resume,
            concurrency: self.config.translation.concurrent_requests,
            keep_columns: self.config.output.keep_columns.clone(),
            include_status_columns: self.config.output.include_status_columns,
            output: Some(OutputTarget {
                path,
                format: self.config.output.format,
                statistics_path,
            }),
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.interactive {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.enable_steady_tick(Duration::from_millis(200));
        progress_bar
    }

    /// First Ctrl-C stops between cells; the run then flushes and exits
    fn spawn_interrupt_handler(&self) -> tokio::task::JoinHandle<()> {
        let stop = self.stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight cells and saving the checkpoint...");
                stop.stop();
            }
        })
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
