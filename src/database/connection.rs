/*!
 * SQLite connection for the checkpoint database.
 *
 * rusqlite is synchronous, so every async call moves the work onto the
 * blocking pool. One connection is shared behind a mutex.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;

/// File name of the checkpoint database inside its directory
pub const CHECKPOINT_DB_FILENAME: &str = "checkpoint.db";

/// Shared handle to the checkpoint database
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection").field("db_path", &self.db_path).finish()
    }
}

impl DatabaseConnection {
    /// Open (or create) `checkpoint.db` inside `dir`
    pub fn open_in_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create checkpoint directory: {:?}", dir))?;

        let db_path = dir.join(CHECKPOINT_DB_FILENAME);
        info!("Opening checkpoint database at {:?}", db_path);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;
        Self::from_connection(conn, db_path)
    }

    /// Database that lives only as long as this handle
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory checkpoint database");
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` with the connection on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .context("Database task panicked")?
    }

    /// Run `f` inside a transaction on the blocking pool; commits only if `f` succeeds
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .context("Database transaction task panicked")?
    }
}
