/*!
 * Database module for persistent checkpoint storage.
 *
 * This module provides SQLite-based persistence for:
 * - Run metadata (dataset fingerprint, progress prefix)
 * - Per-cell translation results, keyed by row and column
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
