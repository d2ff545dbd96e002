/*!
 * Run statistics.
 *
 * Collected while the pipeline runs and written next to the output as
 * `<stem>_stats.json` once the run completes.
 */

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::time::Instant;

use super::cell::CellOutcome;
use super::model::{CellId, CellStatus};

/// Maximum number of failed cells listed in the report
const MAX_REPORTED_FAILURES: usize = 100;

/// Calls per backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendUsage {
    /// Cells whose kept translation came from this backend
    pub translated: usize,
    /// Calls that ended in an error after retries
    pub errors: usize,
}

/// A cell that ended without a validated translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCell {
    pub cell: CellId,
    pub status: String,
    pub error: Option<String>,
}

/// Statistics of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Required cells in the dataset
    pub total_cells: usize,
    /// Cells already completed by the checkpoint this run resumed from
    pub resumed_cells: usize,
    /// Cells translated by this run
    pub processed: usize,
    /// Cells left for a later run after every backend rejected the credentials
    #[serde(default)]
    pub deferred: usize,
    pub successes: usize,
    pub failures: usize,
    pub validation_failures: usize,
    pub fallback_used: usize,
    pub total_attempts: u64,
    pub backend_usage: BTreeMap<String, BackendUsage>,
    /// First failed cells, capped
    pub failed_cells: Vec<FailedCell>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub elapsed_secs: f64,

    #[serde(skip)]
    start: Option<Instant>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl RunStatistics {
    /// Start collecting for a run over `total_cells` cells
    pub fn new(total_cells: usize, resumed_cells: usize) -> Self {
        Self {
            total_cells,
            resumed_cells,
            processed: 0,
            deferred: 0,
            successes: 0,
            failures: 0,
            validation_failures: 0,
            fallback_used: 0,
            total_attempts: 0,
            backend_usage: BTreeMap::new(),
            failed_cells: Vec::new(),
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            elapsed_secs: 0.0,
            start: Some(Instant::now()),
        }
    }

    /// Account for one translated cell
    pub fn record(&mut self, outcome: &CellOutcome) {
        let result = &outcome.result;
        self.processed += 1;
        self.record_calls(outcome);
        if outcome.used_fallback {
            self.fallback_used += 1;
        }

        if let Some(backend) = result.backend_used {
            self.backend_usage.entry(backend.to_string()).or_default().translated += 1;
        }

        let status = result.status();
        match status {
            CellStatus::Ok => self.successes += 1,
            CellStatus::ValidationFailed => self.validation_failures += 1,
            CellStatus::Failed => self.failures += 1,
        }

        if status != CellStatus::Ok && self.failed_cells.len() < MAX_REPORTED_FAILURES {
            self.failed_cells.push(FailedCell {
                cell: result.cell_id(),
                status: status.to_string(),
                error: result.error.clone(),
            });
        }
    }

    /// Account for a cell that is not stored; only its backend calls count
    pub fn record_deferred(&mut self, outcome: &CellOutcome) {
        self.deferred += 1;
        self.record_calls(outcome);
    }

    fn record_calls(&mut self, outcome: &CellOutcome) {
        self.total_attempts += u64::from(outcome.result.attempt_count);
        for (backend, _) in &outcome.backend_errors {
            self.backend_usage.entry(backend.to_string()).or_default().errors += 1;
        }
    }

    /// Cells that are done, including resumed ones
    pub fn completed(&self) -> usize {
        self.resumed_cells + self.processed
    }

    /// Share of processed cells with a validated translation, in percent
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 100.0;
        }
        self.successes as f64 / self.processed as f64 * 100.0
    }

    /// Stop the clock
    pub fn finish(&mut self) {
        if let Some(start) = self.start {
            self.elapsed_secs = start.elapsed().as_secs_f64();
        }
        self.finished_at = Some(Utc::now().to_rfc3339());
    }

    /// Write the statistics as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize statistics")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write statistics to {}", path.display()))?;
        Ok(())
    }

    /// Generate a summary of the run
    pub fn summary(&self) -> String {
        let usage = self
            .backend_usage
            .iter()
            .map(|(name, usage)| format!("{} {} ok / {} errors", name, usage.translated, usage.errors))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Run Summary:\n\
             Cells: {} ({} from checkpoint)\n\
             Processed: {} ({} deferred)\n\
             Successful: {} ({:.1}%)\n\
             Validation failures: {}\n\
             Failed: {}\n\
             Fallback used: {}\n\
             Backend calls: {}\n\
             Backends: {}\n\
             Elapsed time: {:.2}s",
            self.total_cells,
            self.resumed_cells,
            self.processed,
            self.deferred,
            self.successes,
            self.success_rate(),
            self.validation_failures,
            self.failures,
            self.fallback_used,
            self.total_attempts,
            if usage.is_empty() { "none".to_string() } else { usage },
            self.elapsed_secs
        )
    }
}
