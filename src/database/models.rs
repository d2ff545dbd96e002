/*!
 * Database entity models.
 *
 * These structures map directly to the checkpoint tables and convert
 * to and from the pipeline's types.
 */

use anyhow::{anyhow, Result};

use crate::app_config::BackendId;
use crate::errors::FailureKind;
use crate::translation::TranslationResult;

/// Row of the `checkpoint_meta` table
#[derive(Debug, Clone, PartialEq)]
pub struct MetaRecord {
    pub run_id: String,
    pub dataset_fingerprint: String,
    pub total_required_cells: i64,
    pub last_completed_index: i64,
    pub created_at: String,
    pub last_checkpoint_time: Option<String>,
}

/// Row of the `cell_results` table
#[derive(Debug, Clone, PartialEq)]
pub struct CellResultRecord {
    pub row_index: i64,
    pub column_name: String,
    pub translated_text: Option<String>,
    pub backend_used: Option<String>,
    pub validation_passed: bool,
    pub attempt_count: i64,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl From<&TranslationResult> for CellResultRecord {
    fn from(result: &TranslationResult) -> Self {
        Self {
            row_index: result.row_index as i64,
            column_name: result.column_name.clone(),
            translated_text: result.translated_text.clone(),
            backend_used: result.backend_used.map(|b| b.to_string()),
            validation_passed: result.validation_passed,
            attempt_count: result.attempt_count as i64,
            error: result.error.clone(),
            error_kind: result.error_kind.map(|k| k.to_string()),
        }
    }
}

impl TryFrom<CellResultRecord> for TranslationResult {
    type Error = anyhow::Error;

    fn try_from(record: CellResultRecord) -> Result<Self> {
        let backend_used = record
            .backend_used
            .as_deref()
            .map(str::parse::<BackendId>)
            .transpose()
            .map_err(|e| anyhow!("{}", e))?;
        let error_kind = record
            .error_kind
            .as_deref()
            .map(str::parse::<FailureKind>)
            .transpose()
            .map_err(|e| anyhow!(e))?;

        Ok(Self {
            row_index: usize::try_from(record.row_index)?,
            column_name: record.column_name,
            translated_text: record.translated_text,
            backend_used,
            validation_passed: record.validation_passed,
            attempt_count: u32::try_from(record.attempt_count)?,
            error: record.error,
            error_kind,
        })
    }
}
