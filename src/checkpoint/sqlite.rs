/*!
 * SQLite-backed checkpoint store.
 *
 * The whole checkpoint is loaded into memory on open. Writes are buffered
 * and flushed in a single transaction, so a crash mid-flush leaves the
 * previous checkpoint intact.
 */

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use std::path::Path;

use super::{CheckpointMeta, CheckpointState, CheckpointStore};
use crate::database::models::{CellResultRecord, MetaRecord};
use crate::database::{DatabaseConnection, Repository};
use crate::errors::CheckpointError;
use crate::translation::{CellId, TranslationResult};

impl From<MetaRecord> for CheckpointMeta {
    fn from(record: MetaRecord) -> Self {
        Self {
            run_id: record.run_id,
            fingerprint: record.dataset_fingerprint,
            total_required_cells: record.total_required_cells.max(0) as usize,
            last_completed_index: record.last_completed_index.max(0) as usize,
            created_at: record.created_at,
            last_checkpoint_time: record.last_checkpoint_time,
        }
    }
}

impl From<&CheckpointMeta> for MetaRecord {
    fn from(meta: &CheckpointMeta) -> Self {
        Self {
            run_id: meta.run_id.clone(),
            dataset_fingerprint: meta.fingerprint.clone(),
            total_required_cells: meta.total_required_cells as i64,
            last_completed_index: meta.last_completed_index as i64,
            created_at: meta.created_at.clone(),
            last_checkpoint_time: meta.last_checkpoint_time.clone(),
        }
    }
}

/// Checkpoint persisted in `<dir>/checkpoint.db`
#[derive(Debug)]
pub struct SqliteCheckpointStore {
    repo: Repository,
    state: CheckpointState,
}

impl SqliteCheckpointStore {
    /// Open (or create) the checkpoint in `dir` and load what it holds
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CheckpointError> {
        let dir = dir.as_ref();
        let db = DatabaseConnection::open_in_dir(dir)?;
        let repo = Repository::new(db);

        let mut state = CheckpointState {
            meta: repo.load_meta().await?.map(CheckpointMeta::from),
            ..CheckpointState::default()
        };

        for record in repo.load_results().await? {
            let result = TranslationResult::try_from(record)?;
            state.results.insert(result.cell_id(), result);
        }

        match &state.meta {
            Some(meta) => info!(
                "Loaded checkpoint {} with {} stored results ({} of {} cells in completed prefix)",
                short_id(&meta.run_id),
                state.results.len(),
                meta.last_completed_index,
                meta.total_required_cells
            ),
            None => debug!("No checkpoint found in {:?}", dir),
        }

        Ok(Self { repo, state })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
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
        self.repo.reset(&MetaRecord::from(&meta)).await?;
        info!(
            "Started checkpoint {} for {} cells",
            short_id(&meta.run_id),
            meta.total_required_cells
        );
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
        if !self.state.needs_flush() {
            return Ok(());
        }

        let records: Vec<CellResultRecord> = self
            .state
            .dirty_results()
            .into_iter()
            .map(CellResultRecord::from)
            .collect();
        let count = records.len();
        let prefix = self
            .state
            .meta
            .as_ref()
            .map(|m| m.last_completed_index)
            .unwrap_or(0);
        let time = Utc::now().to_rfc3339();

        self.repo
            .save_batch(records, prefix as i64, time.clone())
            .await?;
        self.state.mark_flushed(time);

        debug!("Checkpoint flushed: {} results, prefix {}", count, prefix);
        Ok(())
    }

    fn pending_writes(&self) -> usize {
        self.state.dirty.len()
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
