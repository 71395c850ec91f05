//! Infrastructure layer for ragline
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, plus configuration and dataset loading.

pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod ollama;
pub mod qdrant;

// Re-export commonly used types
pub use config::{
    ConfigLoader, FileConfig, FileDatasetConfig, FileLoggingConfig, FileOutputConfig,
    FilePipelineConfig, FileProviderConfig, FileResolverConfig, FileStoreConfig,
};
pub use dataset::{DatasetFile, DatasetLoader};
pub use error::ConfigError;
pub use logging::JsonlTranscriptLogger;
pub use ollama::OllamaProvider;
pub use qdrant::QdrantStore;
