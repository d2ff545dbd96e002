/*!
 * Loading datasets from local files.
 */

use log::{info, warn};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::{DatasetFormat, DatasetLoader, Table};
use crate::errors::DatasetError;

/// Source prefixes of remote dataset hubs
const REMOTE_PREFIXES: &[&str] = &["kaggle:", "huggingface:"];

/// Loads csv, tsv, json, jsonl and parquet files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileLoader;

impl DatasetLoader for LocalFileLoader {
    fn load(&self, source: &str) -> Result<Table, DatasetError> {
        if let Some(prefix) = REMOTE_PREFIXES.iter().find(|p| source.starts_with(*p)) {
            return Err(DatasetError::NotFound(format!(
                "{} (remote {} datasets are not supported, download the file first)",
                source,
                prefix.trim_end_matches(':')
            )));
        }

        let path = Path::new(source);
        if !path.is_file() {
            return Err(DatasetError::NotFound(source.to_string()));
        }

        let format = DatasetFormat::detect(path);
        let table = match format {
            DatasetFormat::Csv => read_delimited(path, b',')?,
            DatasetFormat::Tsv => read_delimited(path, b'\t')?,
            DatasetFormat::Json => read_json(path)?,
            DatasetFormat::Jsonl => read_jsonl(path)?,
            DatasetFormat::Parquet => read_parquet(path)?,
        };

        info!(
            "Loaded {} rows x {} columns from {} ({:?})",
            table.row_count(),
            table.columns().len(),
            source,
            format
        );
        Ok(table)
    }
}

/// Read file text, decoding as Latin-1 when it is not valid UTF-8
fn read_text_lossless(path: &Path) -> Result<String, DatasetError> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text.trim_start_matches('\u{feff}').to_string()),
        Err(err) => {
            warn!("{} is not valid UTF-8, decoding as Latin-1", path.display());
            Ok(err.into_bytes().iter().map(|&b| b as char).collect())
        }
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Table, DatasetError> {
    let text = if delimiter == b',' {
        read_text_lossless(path)?
    } else {
        String::from_utf8(fs::read(path)?)
            .map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?;
        rows.push(record.iter().map(String::from).collect());
    }

    Table::new(columns, rows)
}

fn read_json(path: &Path) -> Result<Table, DatasetError> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?;

    match value {
        Value::Array(records) => table_from_records(records),
        _ => Err(DatasetError::Format(format!(
            "{}: expected an array of records",
            path.display()
        ))),
    }
}

fn read_jsonl(path: &Path) -> Result<Table, DatasetError> {
    let text = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| {
            DatasetError::Format(format!("{} line {}: {}", path.display(), line_no + 1, e))
        })?;
        records.push(value);
    }
    table_from_records(records)
}

/// Columns in first-seen key order
fn table_from_records(records: Vec<Value>) -> Result<Table, DatasetError> {
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        let object = record
            .as_object()
            .ok_or_else(|| DatasetError::Format("every record must be a JSON object".to_string()))?;
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).map(json_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    Table::new(columns, rows)
}

fn json_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_parquet(path: &Path) -> Result<Table, DatasetError> {
    let file = fs::File::open(path)?;
    let reader = SerializedFileReader::new(file)
        .map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?;

    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let iter = reader
        .get_row_iter(None)
        .map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for row in iter {
        let row = row.map_err(|e| DatasetError::Format(format!("{}: {}", path.display(), e)))?;
        let mut cells = vec![String::new(); columns.len()];
        for (name, field) in row.get_column_iter() {
            if let Some(index) = columns.iter().position(|c| c == name) {
                cells[index] = parquet_cell(field);
            }
        }
        rows.push(cells);
    }

    Table::new(columns, rows)
}

fn parquet_cell(field: &Field) -> String {
    match field {
        Field::Null => String::new(),
        Field::Str(s) => s.clone(),
        Field::Bytes(b) => String::from_utf8_lossy(b.data()).to_string(),
        other => other.to_string(),
    }
}
