/*!
 * Tabular datasets.
 *
 * - `Table`: ordered named columns over rows of string cells
 * - `loader`: reading local csv, tsv, json, jsonl and parquet files
 * - `writer`: writing the translated table as csv, json or parquet
 */

use std::path::Path;

use crate::errors::DatasetError;

pub mod loader;
pub mod writer;

pub use loader::LocalFileLoader;
pub use writer::write_table;

/// Average cell length above which a column counts as text
const TEXT_COLUMN_MIN_AVG_LEN: f64 = 10.0;

/// An in-memory table of string cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table; short rows are padded with empty cells
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DatasetError> {
        let width = columns.len();
        let mut rows = rows;
        for (index, row) in rows.iter_mut().enumerate() {
            if row.len() > width {
                return Err(DatasetError::Format(format!(
                    "row {} has {} cells but the table has {} columns",
                    index,
                    row.len(),
                    width
                )));
            }
            row.resize(width, String::new());
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell text; empty for out-of-range positions
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Names from `wanted` that are not columns of this table
    pub fn missing_columns(&self, wanted: &[String]) -> Vec<String> {
        wanted
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .cloned()
            .collect()
    }

    /// Keep only the first `limit` rows
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    /// Columns that look like free text: not numeric, average length over 10
    pub fn text_columns(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }

        self.columns
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                let values: Vec<&str> = self.rows.iter().map(|r| r[*index].as_str()).collect();
                let numeric = values
                    .iter()
                    .filter(|v| !v.trim().is_empty())
                    .all(|v| v.trim().parse::<f64>().is_ok());
                let avg_len = values.iter().map(|v| v.chars().count()).sum::<usize>() as f64
                    / values.len() as f64;
                !numeric && avg_len > TEXT_COLUMN_MIN_AVG_LEN
            })
            .map(|(_, name)| name.clone())
            .collect()
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Tsv,
    Json,
    Jsonl,
    Parquet,
}

impl DatasetFormat {
    /// Detect the format from the file extension; csv when unknown
    pub fn detect<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "tsv" => Self::Tsv,
            "jsonl" | "ndjson" => Self::Jsonl,
            "json" => Self::Json,
            "parquet" => Self::Parquet,
            _ => Self::Csv,
        }
    }
}

/// Source of a tabular dataset
pub trait DatasetLoader {
    fn load(&self, source: &str) -> Result<Table, DatasetError>;
}
