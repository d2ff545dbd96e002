/*!
 * Checkpoint storage for resumable runs.
 *
 * A checkpoint maps each completed cell to its `TranslationResult` and
 * carries one metadata record describing the run it belongs to. Results are
 * buffered by `put` and become durable on `flush`; a result that was never
 * flushed is treated as not done and translated again on resume.
 *
 * Two stores implement the trait:
 * - `SqliteCheckpointStore`: `<dir>/checkpoint.db`, used for real runs
 * - `MemoryCheckpointStore`: used when checkpointing is disabled and in tests
 */

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::errors::CheckpointError;
use crate::translation::{CellId, TranslationResult};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

/// Metadata record of a checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMeta {
    /// Random id of the run that created the checkpoint
    pub run_id: String,
    /// Hash of the selected columns and required cells
    pub fingerprint: String,
    pub total_required_cells: usize,
    /// Length of the longest fully completed prefix of the required cells
    pub last_completed_index: usize,
    /// RFC 3339 timestamps
    pub created_at: String,
    pub last_checkpoint_time: Option<String>,
}

impl CheckpointMeta {
    /// Metadata for a fresh run
    pub fn new(fingerprint: impl Into<String>, total_required_cells: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            fingerprint: fingerprint.into(),
            total_required_cells,
            last_completed_index: 0,
            created_at: Utc::now().to_rfc3339(),
            last_checkpoint_time: None,
        }
    }
}

/// Durable upsert store of per-cell results
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Metadata of the loaded or current checkpoint
    fn metadata(&self) -> Option<&CheckpointMeta>;

    /// Stored result for a cell, flushed or not
    fn get(&self, cell: &CellId) -> Option<&TranslationResult>;

    /// Number of cells with a result
    fn completed_count(&self) -> usize;

    /// Discard everything and start a checkpoint described by `meta`
    async fn reset(&mut self, meta: CheckpointMeta) -> Result<(), CheckpointError>;

    /// Record a result; replaces any previous result for the same cell
    fn put(&mut self, result: TranslationResult);

    /// Move the completed prefix forward; smaller values are ignored
    fn advance(&mut self, last_completed_index: usize);

    /// Make all buffered results durable
    async fn flush(&mut self) -> Result<(), CheckpointError>;

    /// Results recorded since the last flush
    fn pending_writes(&self) -> usize;
}

/// In-memory view shared by both store implementations
#[derive(Debug, Default)]
struct CheckpointState {
    meta: Option<CheckpointMeta>,
    results: BTreeMap<CellId, TranslationResult>,
    dirty: BTreeSet<CellId>,
    /// Prefix advanced since the last flush
    prefix_dirty: bool,
}

impl CheckpointState {
    fn reset(&mut self, meta: CheckpointMeta) {
        self.meta = Some(meta);
        self.results.clear();
        self.dirty.clear();
        self.prefix_dirty = false;
    }

    fn put(&mut self, result: TranslationResult) {
        let cell = result.cell_id();
        self.dirty.insert(cell.clone());
        self.results.insert(cell, result);
    }

    fn advance(&mut self, last_completed_index: usize) {
        if let Some(meta) = self.meta.as_mut() {
            if last_completed_index > meta.last_completed_index {
                meta.last_completed_index = last_completed_index;
                self.prefix_dirty = true;
            }
        }
    }

    fn needs_flush(&self) -> bool {
        !self.dirty.is_empty() || self.prefix_dirty
    }

    /// Results waiting for the next flush, in cell order
    fn dirty_results(&self) -> Vec<&TranslationResult> {
        self.dirty
            .iter()
            .filter_map(|cell| self.results.get(cell))
            .collect()
    }

    fn mark_flushed(&mut self, time: String) {
        self.dirty.clear();
        self.prefix_dirty = false;
        if let Some(meta) = self.meta.as_mut() {
            meta.last_checkpoint_time = Some(time);
        }
    }
}
