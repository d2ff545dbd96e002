use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::app_config::OutputFormat;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Output path for a translated dataset
    // @params: input_file, format
    pub fn generate_output_path<P: AsRef<Path>>(input_file: P, format: OutputFormat) -> PathBuf {
        let input_file = input_file.as_ref();
        let stem = input_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset".to_string());

        input_file.with_file_name(format!("{}_translated.{}", stem, format.extension()))
    }

    // @generates: Statistics path next to an output file
    pub fn statistics_path<P: AsRef<Path>>(output_file: P) -> PathBuf {
        let output_file = output_file.as_ref();
        let stem = output_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        output_file.with_file_name(format!("{}_stats.json", stem))
    }

    /// Write a file through a temporary sibling and rename it into place
    pub fn write_atomic<P, F>(path: P, write: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut File) -> Result<()>,
    {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        write(temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(path)
            .with_context(|| format!("Failed to write file: {:?}", path))?;
        Ok(())
    }
}
