//! Startup errors raised by the infrastructure layer.
//!
//! Everything here is fatal: the binary reports it and exits. Per-request
//! failures never take this path.

use ragline_domain::DomainError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Failed to read dataset {}: {source}", path.display())]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset {}: {message}", path.display())]
    DatasetFormat { path: PathBuf, message: String },

    #[error(transparent)]
    Dataset(#[from] DomainError),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
