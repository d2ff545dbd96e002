/*!
 * Checkpoint database schema.
 *
 * The layout version lives in SQLite's `user_version` pragma. A database
 * written by a newer layout is refused rather than guessed at.
 */

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Layout version written by this build
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = r#"
    -- Single-row run metadata
    CREATE TABLE IF NOT EXISTS checkpoint_meta (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        run_id TEXT NOT NULL,
        dataset_fingerprint TEXT NOT NULL,
        total_required_cells INTEGER NOT NULL,
        last_completed_index INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        last_checkpoint_time TEXT
    );

    -- One row per completed cell
    CREATE TABLE IF NOT EXISTS cell_results (
        row_index INTEGER NOT NULL,
        column_name TEXT NOT NULL,
        translated_text TEXT,
        backend_used TEXT,
        validation_passed INTEGER NOT NULL,
        attempt_count INTEGER NOT NULL DEFAULT 0,
        error TEXT,
        error_kind TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (row_index, column_name)
    );
"#;

/// Create the tables on a fresh database and check the version of an existing one
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // WAL keeps committed checkpoints intact if the process dies mid-write
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL journal")?;

    let version = schema_version(conn)?;
    match version {
        0 => {
            info!("Creating checkpoint schema v{}", SCHEMA_VERSION);
            conn.execute_batch(CREATE_TABLES)
                .context("Failed to create checkpoint tables")?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        SCHEMA_VERSION => debug!("Checkpoint schema is up to date (v{})", version),
        other => bail!(
            "checkpoint database has schema v{}, this build understands v{}",
            other,
            SCHEMA_VERSION
        ),
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to read schema version")
}
