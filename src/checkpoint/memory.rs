/*!
 * Non-durable checkpoint store.
 */

use async_trait::async_trait;
use chrono::Utc;

use super::{CheckpointMeta, CheckpointState, CheckpointStore};
use crate::errors::CheckpointError;
use crate::translation::{CellId, TranslationResult};

/// Keeps results in memory only; `flush` just clears the write buffer
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    state: CheckpointState,
    flushes: usize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flushes that wrote something
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    fn metadata(&self) -> Option<&CheckpointMeta> {
        self.state.meta.as_ref()
    }

    fn get(&self, cell: &CellId) -> Option<&TranslationResult> {
        self.state.results.get(cell)
    }

    fn completed_count(&self) -> usize {
        self.state.results.len()
    }

    async fn reset(&mut self, meta: CheckpointMeta) -> Result<(), CheckpointError> {
        self.state.reset(meta);
        Ok(())
    }

    fn put(&mut self, result: TranslationResult) {
        self.state.put(result);
    }

    fn advance(&mut self, last_completed_index: usize) {
        self.state.advance(last_completed_index);
    }

    async fn flush(&mut self) -> Result<(), CheckpointError> {
        if self.state.needs_flush() {
            self.flushes += 1;
            self.state.mark_flushed(Utc::now().to_rfc3339());
        }
        Ok(())
    }

    fn pending_writes(&self) -> usize {
        self.state.dirty.len()
    }
}
