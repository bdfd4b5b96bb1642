//! Data module - source resolution, loading, schema inspection and filtering

pub mod loader;
pub mod processor;
pub mod resolver;
pub mod schema;

pub use loader::DataLoader;
pub use processor::{DataProcessor, DateRange, ProcessorError};
pub use resolver::{
    DataSourceResolver, ResolveError, ResolvedSource, SourceCandidates, UploadedFile,
};
pub use schema::SchemaInfo;
