/*!
 * Repository layer for checkpoint persistence.
 *
 * This module provides a high-level API over the checkpoint tables,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use super::connection::DatabaseConnection;
use super::models::{CellResultRecord, MetaRecord};

/// Repository for checkpoint database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    // =========================================================================
    // Metadata Operations
    // =========================================================================

    /// Load the run metadata, if a checkpoint exists
    pub async fn load_meta(&self) -> Result<Option<MetaRecord>> {
        self.db.execute_async(|conn| read_meta(conn)).await
    }

    /// Drop all stored results and start a new checkpoint with `meta`
    pub async fn reset(&self, meta: &MetaRecord) -> Result<()> {
        let meta = meta.clone();

        self.db
            .transaction_async(move |tx| {
                let removed = tx.execute("DELETE FROM cell_results", [])?;
                tx.execute("DELETE FROM checkpoint_meta", [])?;
                tx.execute(
                    r#"
                    INSERT INTO checkpoint_meta (
                        id, run_id, dataset_fingerprint, total_required_cells,
                        last_completed_index, created_at, last_checkpoint_time
                    ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        meta.run_id,
                        meta.dataset_fingerprint,
                        meta.total_required_cells,
                        meta.last_completed_index,
                        meta.created_at,
                        meta.last_checkpoint_time,
                    ],
                )?;
                debug!("Checkpoint reset, removed {} stored results", removed);
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Cell Result Operations
    // =========================================================================

    /// Load every stored cell result
    pub async fn load_results(&self) -> Result<Vec<CellResultRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT row_index, column_name, translated_text, backend_used,
                           validation_passed, attempt_count, error, error_kind
                    FROM cell_results
                    ORDER BY row_index, column_name
                    "#,
                )?;

                let records = stmt
                    .query_map([], |row| {
                        Ok(CellResultRecord {
                            row_index: row.get(0)?,
                            column_name: row.get(1)?,
                            translated_text: row.get(2)?,
                            backend_used: row.get(3)?,
                            validation_passed: row.get(4)?,
                            attempt_count: row.get(5)?,
                            error: row.get(6)?,
                            error_kind: row.get(7)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(records)
            })
            .await
    }

    /// Upsert a batch of results and advance the metadata in one transaction
    pub async fn save_batch(
        &self,
        records: Vec<CellResultRecord>,
        last_completed_index: i64,
        checkpoint_time: String,
    ) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                {
                    let mut stmt = tx.prepare(
                        r#"
                        INSERT INTO cell_results (
                            row_index, column_name, translated_text, backend_used,
                            validation_passed, attempt_count, error, error_kind, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        ON CONFLICT(row_index, column_name) DO UPDATE SET
                            translated_text = excluded.translated_text,
                            backend_used = excluded.backend_used,
                            validation_passed = excluded.validation_passed,
                            attempt_count = excluded.attempt_count,
                            error = excluded.error,
                            error_kind = excluded.error_kind,
                            updated_at = excluded.updated_at
                        "#,
                    )?;

                    for record in &records {
                        stmt.execute(params![
                            record.row_index,
                            record.column_name,
                            record.translated_text,
                            record.backend_used,
                            record.validation_passed,
                            record.attempt_count,
                            record.error,
                            record.error_kind,
                            checkpoint_time,
                        ])?;
                    }
                }

                tx.execute(
                    r#"
                    UPDATE checkpoint_meta
                    SET last_completed_index = MAX(last_completed_index, ?1),
                        last_checkpoint_time = ?2
                    WHERE id = 1
                    "#,
                    params![last_completed_index, checkpoint_time],
                )?;

                debug!("Flushed {} cell results", records.len());
                Ok(())
            })
            .await
    }

    /// Number of stored results
    pub async fn count_results(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM cell_results", [], |row| row.get(0))?)
            })
            .await
    }
}

fn read_meta(conn: &Connection) -> Result<Option<MetaRecord>> {
    let meta = conn
        .query_row(
            r#"
            SELECT run_id, dataset_fingerprint, total_required_cells,
                   last_completed_index, created_at, last_checkpoint_time
            FROM checkpoint_meta WHERE id = 1
            "#,
            [],
            |row| {
                Ok(MetaRecord {
                    run_id: row.get(0)?,
                    dataset_fingerprint: row.get(1)?,
                    total_required_cells: row.get(2)?,
                    last_completed_index: row.get(3)?,
                    created_at: row.get(4)?,
                    last_checkpoint_time: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(meta)
}
