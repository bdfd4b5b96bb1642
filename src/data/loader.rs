//! CSV Data Loader Module
//! Decodes delimited text in the configured encoding and loads it with Polars.

use crate::config::DashboardConfig;
use encoding_rs::Encoding;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),
    #[error("Duplicate column after trimming headers: {0}")]
    DuplicateColumn(String),
}

/// Loads delimited text files into a Working Table.
#[derive(Debug, Clone)]
pub struct DataLoader {
    encoding: &'static Encoding,
    infer_schema_length: usize,
}

impl DataLoader {
    pub fn new(encoding_label: &str, infer_schema_length: usize) -> Result<Self, LoaderError> {
        let encoding = Encoding::for_label(encoding_label.trim().as_bytes())
            .ok_or_else(|| LoaderError::UnknownEncoding(encoding_label.to_string()))?;
        Ok(Self {
            encoding,
            infer_schema_length,
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, LoaderError> {
        Self::new(&config.encoding, config.infer_schema_length)
    }

    /// Load a CSV file from disk.
    pub fn load_csv(&self, file_path: &Path) -> Result<DataFrame, LoaderError> {
        let bytes = fs::read(file_path).map_err(|source| LoaderError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), file_path.display());
        self.load_csv_bytes(&bytes)
    }

    /// Load CSV content already in memory (e.g. an uploaded file).
    ///
    /// Unmappable bytes are replaced rather than rejected; malformed cells
    /// become null. Column names come back trimmed.
    pub fn load_csv_bytes(&self, bytes: &[u8]) -> Result<DataFrame, LoaderError> {
        let (text, used, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            tracing::warn!("Input contained bytes not valid in {}", used.name());
        }

        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_ignore_errors(true)
            .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
            .finish()?;

        trim_column_names(&mut df)?;
        tracing::debug!("Loaded table with shape {:?}", df.shape());
        Ok(df)
    }
}

/// Strip surrounding whitespace from every column name.
pub fn trim_column_names(df: &mut DataFrame) -> Result<(), LoaderError> {
    let trimmed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();

    let mut seen = HashSet::new();
    for name in &trimmed {
        if !seen.insert(name.as_str()) {
            return Err(LoaderError::DuplicateColumn(name.clone()));
        }
    }

    df.set_column_names(trimmed)?;
    Ok(())
}

/// Get list of column names from a DataFrame.
pub fn get_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// First `n` rows for display.
pub fn preview(df: &DataFrame, n: usize) -> DataFrame {
    df.head(Some(n))
}

/// Render one cell for display, without the quoting Polars adds to strings.
pub fn cell_text(column: &Column, row: usize) -> String {
    match column.get(row) {
        Ok(AnyValue::Null) | Err(_) => String::new(),
        Ok(val) => val.to_string().trim_matches('"').to_string(),
    }
}
