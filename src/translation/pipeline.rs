/*!
 * Pipeline driving a dataset through translation.
 *
 * The pipeline moves through these states:
 *
 * `Initializing -> LoadingCheckpoint -> Running -> Finalizing -> Done`
 *
 * with `Failed` reachable from `Running` when no progress is possible
 * (every backend rejected our credentials, or the checkpoint cannot be
 * written). Required cells are enumerated row-major in the configured
 * column order; cells already in the checkpoint are skipped. A single
 * driver consumes an ordered, bounded stream of cell translations and is
 * the only writer of the checkpoint store.
 */

use futures::future;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::cell::CellTranslator;
use super::model::{CellId, CellStatus, WorkItem};
use super::stats::RunStatistics;
use crate::app_config::OutputFormat;
use crate::checkpoint::{CheckpointMeta, CheckpointStore};
use crate::dataset::{write_table, Table};
use crate::errors::{CheckpointError, DatasetError, PipelineError};

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    LoadingCheckpoint,
    Running,
    Finalizing,
    Done,
    Failed,
}

/// Cooperative stop request, checked between work items
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Every required cell has a result; some may be failures
    Completed { cell_failures: usize },
    /// A stop was requested before all cells were done
    Interrupted { processed: usize, total: usize },
    /// A fatal condition stopped the run
    Aborted {
        reason: String,
        processed: usize,
        total: usize,
    },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { cell_failures: 0 } => write!(f, "completed"),
            Self::Completed { cell_failures } => {
                write!(f, "completed with {} cell failures", cell_failures)
            }
            Self::Interrupted { processed, total } => {
                write!(f, "interrupted after {} of {} cells", processed, total)
            }
            Self::Aborted {
                reason,
                processed,
                total,
            } => write!(f, "aborted after {} of {} cells: {}", processed, total, reason),
        }
    }
}

/// Outcome of `Pipeline::run`
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: RunStatistics,
    /// Assembled result table; cells without a result are empty
    pub output: Table,
    /// Where the output was written, if it was
    pub output_path: Option<PathBuf>,
}

/// Where a completed run writes its results
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Also write the run statistics here
    pub statistics_path: Option<PathBuf>,
}

/// Settings for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Flush the checkpoint after this many completed cells
    pub checkpoint_interval: usize,
    /// When false the store is only used in memory
    pub checkpointing: bool,
    /// Continue from the store's checkpoint instead of clearing it
    pub resume: bool,
    pub concurrency: usize,
    /// Source columns copied to the output; all when `None`
    pub keep_columns: Option<Vec<String>>,
    pub include_status_columns: bool,
    pub output: Option<OutputTarget>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            checkpoint_interval: 50,
            checkpointing: true,
            resume: false,
            concurrency: 1,
            keep_columns: None,
            include_status_columns: false,
            output: None,
        }
    }
}

/// Progress callback receiving `(completed, total)`
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Translation pipeline over one dataset
pub struct Pipeline {
    translator: Arc<CellTranslator>,
    store: Box<dyn CheckpointStore>,
    options: PipelineOptions,
    state: PipelineState,
    stop: StopSignal,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    pub fn new(
        translator: Arc<CellTranslator>,
        store: Box<dyn CheckpointStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            translator,
            store,
            options,
            state: PipelineState::Initializing,
            stop: StopSignal::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// The checkpoint store, e.g. to inspect results after a run
    pub fn store(&self) -> &dyn CheckpointStore {
        self.store.as_ref()
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn report_progress(&self, done: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(done, total);
        }
    }

    /// Translate `columns` of `table`
    pub async fn run(&mut self, table: &Table, columns: &[String]) -> Result<RunReport, PipelineError> {
        let result = self.run_inner(table, columns).await;
        if result.is_err() {
            self.transition(PipelineState::Failed);
        }
        result
    }

    async fn run_inner(&mut self, table: &Table, columns: &[String]) -> Result<RunReport, PipelineError> {
        self.transition(PipelineState::Initializing);

        let missing = table.missing_columns(columns);
        if !missing.is_empty() {
            return Err(DatasetError::Format(format!(
                "columns not found in dataset: {}",
                missing.join(", ")
            ))
            .into());
        }
        if let Some(keep) = &self.options.keep_columns {
            let missing = table.missing_columns(keep);
            if !missing.is_empty() {
                return Err(DatasetError::Format(format!(
                    "kept columns not found in dataset: {}",
                    missing.join(", ")
                ))
                .into());
            }
        }

        let required = required_cells(table, columns);
        let dataset_fingerprint = fingerprint(columns, &required);
        let total = required.len();
        info!(
            "{} cells to translate in {} rows across columns [{}]",
            total,
            table.row_count(),
            columns.join(", ")
        );

        if self.options.checkpointing {
            self.transition(PipelineState::LoadingCheckpoint);
        }
        self.load_checkpoint(&dataset_fingerprint, total).await?;

        let prefix = self
            .store
            .metadata()
            .map(|m| m.last_completed_index.min(total))
            .unwrap_or(0);
        let mut done: Vec<bool> = required
            .iter()
            .enumerate()
            .map(|(i, item)| i < prefix || self.store.get(&item.cell_id()).is_some())
            .collect();
        let pending: Vec<(usize, WorkItem)> = required
            .iter()
            .enumerate()
            .filter(|(i, _)| !done[*i])
            .map(|(i, item)| (i, item.clone()))
            .collect();

        let resumed = total - pending.len();
        if resumed > 0 {
            info!("Resuming: {} of {} cells already completed", resumed, total);
        }
        let mut stats = RunStatistics::new(total, resumed);
        self.report_progress(resumed, total);

        self.transition(PipelineState::Running);
        let aborted = self.drive(pending, &mut done, &mut stats, total).await?;

        // Final flush for whatever the last interval left
        self.store.flush().await?;

        let completed = done.iter().filter(|d| **d).count();
        let status = if let Some(reason) = aborted {
            error!("Run aborted: {}", reason);
            RunStatus::Aborted {
                reason,
                processed: completed,
                total,
            }
        } else if done.iter().all(|d| *d) {
            RunStatus::Completed {
                cell_failures: self.count_cell_failures(&required),
            }
        } else {
            warn!("Run interrupted after {} of {} cells", completed, total);
            RunStatus::Interrupted {
                processed: completed,
                total,
            }
        };

        stats.finish();

        if matches!(status, RunStatus::Aborted { .. }) {
            self.transition(PipelineState::Failed);
            let output = self.assemble_output(table, columns);
            return Ok(RunReport {
                status,
                stats,
                output,
                output_path: None,
            });
        }

        self.transition(PipelineState::Finalizing);
        let output = self.assemble_output(table, columns);
        let mut output_path = None;

        if status.is_completed() {
            if let Some(target) = &self.options.output {
                write_table(&output, &target.path, target.format)
                    .map_err(|e| PipelineError::Output(format!("{:#}", e)))?;
                if let Some(stats_path) = &target.statistics_path {
                    stats
                        .save(stats_path)
                        .map_err(|e| PipelineError::Output(format!("{:#}", e)))?;
                }
                output_path = Some(target.path.clone());
            }
        }

        info!("Run {}", status);
        self.transition(PipelineState::Done);
        Ok(RunReport {
            status,
            stats,
            output,
            output_path,
        })
    }

    /// Prepare the store for a run over cells with `fingerprint`
    async fn load_checkpoint(&mut self, fingerprint: &str, total: usize) -> Result<(), PipelineError> {
        if self.options.checkpointing && self.options.resume {
            match self.store.metadata() {
                Some(meta) if meta.fingerprint != fingerprint => {
                    return Err(CheckpointError::Mismatch {
                        expected: fingerprint.to_string(),
                        found: meta.fingerprint.clone(),
                    }
                    .into());
                }
                Some(meta) => {
                    info!(
                        "Resuming checkpoint created at {} ({} stored results)",
                        meta.created_at,
                        self.store.completed_count()
                    );
                    return Ok(());
                }
                None => warn!("No checkpoint to resume from, starting a new run"),
            }
        }

        self.store.reset(CheckpointMeta::new(fingerprint, total)).await?;
        Ok(())
    }

    /// Translate pending cells; returns the abort reason if the run had to stop
    async fn drive(
        &mut self,
        pending: Vec<(usize, WorkItem)>,
        done: &mut [bool],
        stats: &mut RunStatistics,
        total: usize,
    ) -> Result<Option<String>, PipelineError> {
        let concurrency = self.options.concurrency.max(1);
        let interval = self.options.checkpoint_interval.max(1);
        let halt = Arc::new(AtomicBool::new(false));
        let stop = self.stop.clone();
        let gate = halt.clone();
        let translator = self.translator.clone();

        // take_while runs when the buffer pulls the next item, so a stop
        // prevents new cells from starting while in-flight ones finish
        let mut outcomes = stream::iter(pending)
            .take_while(move |_| future::ready(!stop.is_stopped() && !gate.load(Ordering::SeqCst)))
            .map(move |(index, item)| {
                let translator = translator.clone();
                async move { (index, translator.translate(item).await) }
            })
            .buffered(concurrency);

        let mut aborted = None;
        let mut since_flush = 0;
        let mut prefix = done.iter().take_while(|d| **d).count();

        while let Some((index, outcome)) = outcomes.next().await {
            if outcome.auth_fatal && aborted.is_none() {
                halt.store(true, Ordering::SeqCst);
                aborted = Some(format!(
                    "all configured backends ({}) rejected the credentials",
                    self.translator
                        .backend_ids()
                        .iter()
                        .map(|b| b.display_name().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }

            // Left out of the checkpoint so a resume with fixed credentials retries it
            if outcome.auth_fatal && outcome.result.status() == CellStatus::Failed {
                stats.record_deferred(&outcome);
                continue;
            }

            stats.record(&outcome);
            self.store.put(outcome.result);
            done[index] = true;
            since_flush += 1;

            while prefix < done.len() && done[prefix] {
                prefix += 1;
            }
            self.store.advance(prefix);
            self.report_progress(stats.completed(), total);

            if since_flush >= interval {
                self.store.flush().await?;
                since_flush = 0;
            }
        }

        Ok(aborted)
    }

    /// Completed cells without a validated translation
    fn count_cell_failures(&self, required: &[WorkItem]) -> usize {
        required
            .iter()
            .filter_map(|item| self.store.get(&item.cell_id()))
            .filter(|result| result.status() != CellStatus::Ok)
            .count()
    }

    /// Kept columns, then `{col}_ar`, `{col}_api` and optionally `{col}_status`
    fn assemble_output(&self, table: &Table, columns: &[String]) -> Table {
        let kept: Vec<usize> = match &self.options.keep_columns {
            Some(keep) => keep.iter().filter_map(|c| table.column_index(c)).collect(),
            None => (0..table.columns().len()).collect(),
        };

        let mut headers: Vec<String> = kept.iter().map(|i| table.columns()[*i].clone()).collect();
        for column in columns {
            headers.push(format!("{}_ar", column));
            headers.push(format!("{}_api", column));
            if self.options.include_status_columns {
                headers.push(format!("{}_status", column));
            }
        }

        let rows = (0..table.row_count())
            .map(|row| {
                let mut cells: Vec<String> = kept.iter().map(|i| table.cell(row, *i).to_string()).collect();
                for column in columns {
                    match self.store.get(&CellId::new(row, column.clone())) {
                        Some(result) => {
                            cells.push(result.translated_text.clone().unwrap_or_default());
                            cells.push(
                                result
                                    .backend_used
                                    .map(|b| b.to_string())
                                    .unwrap_or_else(|| "failed".to_string()),
                            );
                            if self.options.include_status_columns {
                                cells.push(result.status().to_string());
                            }
                        }
                        None => {
                            let width = if self.options.include_status_columns { 3 } else { 2 };
                            cells.extend(std::iter::repeat_n(String::new(), width));
                        }
                    }
                }
                cells
            })
            .collect();

        Table::new(headers, rows).unwrap_or_default()
    }
}

/// Non-blank cells of `columns`, row-major in column order
pub fn required_cells(table: &Table, columns: &[String]) -> Vec<WorkItem> {
    let indices: Vec<(usize, &String)> = columns
        .iter()
        .filter_map(|c| table.column_index(c).map(|i| (i, c)))
        .collect();

    let mut items = Vec::new();
    for row in 0..table.row_count() {
        for (index, column) in &indices {
            let text = table.cell(row, *index);
            if !text.trim().is_empty() {
                items.push(WorkItem {
                    row_index: row,
                    column_name: (*column).clone(),
                    source_text: text.to_string(),
                });
            }
        }
    }
    items
}

/// Hash identifying the selected columns and required cells
pub fn fingerprint(columns: &[String], required: &[WorkItem]) -> String {
    let mut hasher = Sha256::new();
    for column in columns {
        hasher.update(column.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([0xffu8]);
    for item in required {
        hasher.update(item.row_index.to_le_bytes());
        hasher.update(item.column_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(item.source_text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
