//! CSV Export Module
//! Serializes the filtered Working Table as a UTF-8 download artifact.

use polars::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to encode CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// A named, ready-to-save download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

pub struct CsvExporter;

impl CsvExporter {
    /// Comma-delimited with a header row and no row index.
    pub fn to_csv_bytes(df: &DataFrame) -> Result<Vec<u8>, ExportError> {
        let mut buf = Vec::new();
        let mut df = df.clone();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut df)?;
        tracing::debug!("Encoded {} rows into {} bytes", df.height(), buf.len());
        Ok(buf)
    }

    pub fn artifact(df: &DataFrame, file_name: &str) -> Result<ExportArtifact, ExportError> {
        Ok(ExportArtifact {
            file_name: file_name.to_string(),
            mime: "text/csv",
            bytes: Self::to_csv_bytes(df)?,
        })
    }

    /// Save an artifact to `path`, returning the byte count.
    pub fn save(artifact: &ExportArtifact, path: &Path) -> Result<usize, ExportError> {
        fs::write(path, &artifact.bytes)?;
        tracing::info!(
            "Exported {} ({} bytes) to {}",
            artifact.file_name,
            artifact.bytes.len(),
            path.display()
        );
        Ok(artifact.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLoader, DataProcessor};
    use crate::pipeline::{render_state, Selections};

    fn scenario() -> DataFrame {
        df! {
            "Date" => ["2023-12-01", "2023-12-02", "bad", "2023-12-03"],
            "Category" => ["Toys", "Food", "Food", "Toys"],
            "Region" => ["North", "South", "East", "North"],
            "Sales" => [100i64, 50, 10, 75],
            "Discount" => [Some(0.5), None, Some(0.1), Some(0.25)],
        }
        .unwrap()
    }

    #[test]
    fn export_has_header_and_no_index() {
        let bytes = CsvExporter::to_csv_bytes(&scenario()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Date,Category,Region,Sales,Discount"));
        assert_eq!(lines.next(), Some("2023-12-01,Toys,North,100,0.5"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn reimport_reproduces_the_working_table() {
        let views = render_state(&Selections::default(), &scenario()).unwrap();
        let bytes = CsvExporter::to_csv_bytes(&views.filtered).unwrap();

        let loader = DataLoader::new("latin1", 100).unwrap();
        let reloaded = loader.load_csv_bytes(&bytes).unwrap();
        let reloaded = DataProcessor::coerce_dates(&reloaded).unwrap();

        assert_eq!(reloaded.shape(), views.filtered.shape());
        assert_eq!(reloaded.get_column_names(), views.filtered.get_column_names());
        assert!(reloaded.equals_missing(&views.filtered));
    }

    #[test]
    fn utf8_text_survives_round_trip_with_utf8_loader() {
        let df = df! { "Region" => ["Zürich", "Málaga"], "Sales" => [1i64, 2] }.unwrap();
        let bytes = CsvExporter::to_csv_bytes(&df).unwrap();
        let reloaded = DataLoader::new("utf-8", 100)
            .unwrap()
            .load_csv_bytes(&bytes)
            .unwrap();
        assert!(reloaded.equals(&df));
    }

    #[test]
    fn artifact_is_named_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = CsvExporter::artifact(&scenario(), "processed_sales_data.csv").unwrap();
        assert_eq!(artifact.file_name, "processed_sales_data.csv");
        assert_eq!(artifact.mime, "text/csv");
        let path = dir.path().join(&artifact.file_name);
        let written = CsvExporter::save(&artifact, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), written);
    }
}
