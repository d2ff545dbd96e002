/*!
 * Core data types shared by the pipeline and the checkpoint store.
 */

use serde::{Deserialize, Serialize};

use crate::app_config::BackendId;
use crate::errors::FailureKind;

/// Identity of a single cell: row index and column name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub row_index: usize,
    pub column_name: String,
}

impl CellId {
    pub fn new(row_index: usize, column_name: impl Into<String>) -> Self {
        Self {
            row_index,
            column_name: column_name.into(),
        }
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} / {}", self.row_index, self.column_name)
    }
}

/// One cell that needs translating
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub row_index: usize,
    pub column_name: String,
    pub source_text: String,
}

impl WorkItem {
    pub fn cell_id(&self) -> CellId {
        CellId::new(self.row_index, self.column_name.clone())
    }
}

/// Outcome class of a translated cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    /// Translated and passed validation
    Ok,
    /// Translated but the text failed validation
    ValidationFailed,
    /// No translation could be obtained
    Failed,
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Recorded result for one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub row_index: usize,
    pub column_name: String,
    pub translated_text: Option<String>,
    pub backend_used: Option<BackendId>,
    pub validation_passed: bool,
    pub attempt_count: u32,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl TranslationResult {
    pub fn cell_id(&self) -> CellId {
        CellId::new(self.row_index, self.column_name.clone())
    }

    pub fn status(&self) -> CellStatus {
        match (&self.translated_text, self.validation_passed) {
            (Some(_), true) => CellStatus::Ok,
            (Some(_), false) => CellStatus::ValidationFailed,
            (None, _) => CellStatus::Failed,
        }
    }
}
