//! Data Source Resolver
//! Picks the first available source (upload > store > bundled file) and
//! backs flat files with an in-memory store so queries work uniformly.

use crate::config::DashboardConfig;
use crate::data::loader::{trim_column_names, DataLoader, LoaderError};
use crate::store::{QueryGuard, QueryPolicy, SalesStore, StoreError};
use polars::prelude::*;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No file uploaded or sample file found.")]
    SourceUnavailable,
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error("Structured store: {0}")]
    Store(#[from] StoreError),
}

/// A user-supplied file held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Candidate sources, each optional.
#[derive(Debug, Clone, Default)]
pub struct SourceCandidates {
    pub upload: Option<UploadedFile>,
    /// Only set when store usage is switched on.
    pub store_path: Option<PathBuf>,
    pub default_file: Option<PathBuf>,
}

impl SourceCandidates {
    pub fn from_config(config: &DashboardConfig, upload: Option<UploadedFile>) -> Self {
        Self {
            upload,
            store_path: config.use_store.then(|| config.store_path.clone()),
            default_file: Some(config.default_file.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    Upload,
    Store,
    DefaultFile,
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::Upload => write!(f, "Custom file loaded"),
            SourceOrigin::Store => write!(f, "Structured store loaded"),
            SourceOrigin::DefaultFile => write!(f, "Sample dataset loaded"),
        }
    }
}

/// The Working Table plus the store that answers queries about it.
#[derive(Debug)]
pub struct ResolvedSource {
    pub table: DataFrame,
    pub origin: SourceOrigin,
    /// File name or store path shown to the user.
    pub label: String,
    pub store: SalesStore,
}

pub struct DataSourceResolver {
    loader: DataLoader,
    table_name: String,
    guard: QueryGuard,
}

impl DataSourceResolver {
    pub fn new(loader: DataLoader, table_name: &str, guard: QueryGuard) -> Self {
        Self {
            loader,
            table_name: table_name.to_string(),
            guard,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, ResolveError> {
        Ok(Self::new(
            DataLoader::from_config(config)?,
            &config.table_name,
            QueryGuard::new(QueryPolicy::from_read_only_flag(config.read_only_queries)),
        ))
    }

    pub fn resolve(&self, candidates: SourceCandidates) -> Result<ResolvedSource, ResolveError> {
        if let Some(upload) = candidates.upload {
            let table = self.loader.load_csv_bytes(&upload.bytes)?;
            return self.backed_by_memory(table, SourceOrigin::Upload, upload.name);
        }

        if let Some(path) = candidates.store_path.filter(|p| p.exists()) {
            let store = SalesStore::open_existing(&path, &self.table_name)?.with_guard(self.guard);
            let mut table = store.read_table()?;
            trim_column_names(&mut table)?;
            tracing::info!(
                "Using structured store {} (table {})",
                path.display(),
                store.table_name()
            );
            return Ok(ResolvedSource {
                table,
                origin: SourceOrigin::Store,
                label: path.display().to_string(),
                store,
            });
        }

        if let Some(path) = candidates.default_file.filter(|p| p.exists()) {
            let table = self.loader.load_csv(&path)?;
            let label = path.display().to_string();
            return self.backed_by_memory(table, SourceOrigin::DefaultFile, label);
        }

        tracing::warn!("No data source available");
        Err(ResolveError::SourceUnavailable)
    }

    fn backed_by_memory(
        &self,
        table: DataFrame,
        origin: SourceOrigin,
        label: String,
    ) -> Result<ResolvedSource, ResolveError> {
        let mut store = SalesStore::in_memory(&self.table_name)?.with_guard(self.guard);
        store.load_table(&table)?;
        tracing::info!("{}: {} ({} rows)", origin, label, table.height());
        Ok(ResolvedSource {
            table,
            origin,
            label,
            store,
        })
    }
}
