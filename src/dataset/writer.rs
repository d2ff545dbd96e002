/*!
 * Writing tables to csv, json and parquet.
 *
 * Files are written to a temporary file next to the target and renamed
 * into place, so an interrupted write never leaves a truncated output.
 */

use anyhow::{Context, Result};
use log::info;
use parquet::basic::{Compression, LogicalType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::Type;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use super::Table;
use crate::app_config::OutputFormat;
use crate::file_utils::FileManager;

/// Write `table` to `path` in `format`
pub fn write_table(table: &Table, path: &Path, format: OutputFormat) -> Result<()> {
    FileManager::write_atomic(path, |file| match format {
        OutputFormat::Csv => write_csv(table, file),
        OutputFormat::Json => write_json(table, file),
        OutputFormat::Parquet => write_parquet(table, file),
    })?;

    info!(
        "Wrote {} rows to {} ({})",
        table.row_count(),
        path.display(),
        format
    );
    Ok(())
}

fn write_csv(table: &Table, file: &mut std::fs::File) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Array of records; non-ASCII text is written as-is
fn write_json(table: &Table, file: &mut std::fs::File) -> Result<()> {
    let records: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .columns()
                .iter()
                .zip(row)
                .map(|(column, cell)| (column.clone(), Value::String(cell.clone())))
                .collect();
            Value::Object(object)
        })
        .collect();

    serde_json::to_writer_pretty(&mut *file, &records)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Every column as a required UTF-8 string, snappy compressed
fn write_parquet(table: &Table, file: &mut std::fs::File) -> Result<()> {
    let fields = table
        .columns()
        .iter()
        .map(|name| {
            Type::primitive_type_builder(name, PhysicalType::BYTE_ARRAY)
                .with_repetition(Repetition::REQUIRED)
                .with_logical_type(Some(LogicalType::String))
                .build()
                .map(Arc::new)
                .with_context(|| format!("Failed to build parquet schema for column {}", name))
        })
        .collect::<Result<Vec<_>>>()?;

    let schema = Arc::new(
        Type::group_type_builder("dataset")
            .with_fields(fields)
            .build()
            .context("Failed to build parquet schema")?,
    );
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build(),
    );

    let mut writer = SerializedFileWriter::new(file.try_clone()?, schema, props)
        .context("Failed to create parquet writer")?;
    let mut row_group = writer.next_row_group()?;

    let mut column = 0;
    while let Some(mut column_writer) = row_group.next_column()? {
        let values: Vec<ByteArray> = table
            .rows()
            .iter()
            .map(|row| ByteArray::from(row[column].as_str()))
            .collect();
        match column_writer.untyped() {
            ColumnWriter::ByteArrayColumnWriter(typed) => {
                typed.write_batch(&values, None, None)?;
            }
            _ => anyhow::bail!("unexpected parquet column type for {}", table.columns()[column]),
        }
        column_writer.close()?;
        column += 1;
    }

    row_group.close()?;
    writer.close()?;
    Ok(())
}
