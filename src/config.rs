//! Dashboard Configuration Module
//! One configuration drives every dataset variant (label, sample file, store flag).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings for one dashboard instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Title shown above the dashboard.
    pub dataset_label: String,
    /// Bundled sample file used when nothing else is available.
    pub default_file: PathBuf,
    /// On-disk SQLite store holding the `table_name` table.
    pub store_path: PathBuf,
    /// Prefer the store over the sample file.
    pub use_store: bool,
    pub table_name: String,
    /// WHATWG encoding label for flat-file input.
    pub encoding: String,
    pub infer_schema_length: usize,
    pub export_file_name: String,
    /// Reject anything but read-only statements in the query box.
    pub read_only_queries: bool,
    pub preview_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            dataset_label: "Sales Data Analysis".to_string(),
            default_file: PathBuf::from("sales data analysis.csv"),
            store_path: PathBuf::from("sales.db"),
            use_store: false,
            table_name: "sales".to_string(),
            encoding: "latin1".to_string(),
            infer_schema_length: 10000,
            export_file_name: "processed_sales_data.csv".to_string(),
            read_only_queries: true,
            preview_rows: 5,
        }
    }
}

impl DashboardConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `dashboard.json` in the
    /// working directory is used if present, otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "dataset_label": "Christmas Sales", "use_store": true }}"#
        )
        .unwrap();

        let config = DashboardConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dataset_label, "Christmas Sales");
        assert!(config.use_store);
        assert_eq!(config.table_name, "sales");
        assert_eq!(config.export_file_name, "processed_sales_data.csv");
        assert!(config.read_only_queries);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            DashboardConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            DashboardConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
