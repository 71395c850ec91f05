//! Vector store and dataset configuration (`[store]`, `[dataset]` sections)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Qdrant-compatible store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    pub url: String,
    pub collection: String,
    pub timeout_secs: u64,
    /// Re-fetch resolved records from the store before answering.
    pub hydrate_lookups: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "ragline".to_string(),
            timeout_secs: 10,
            hydrate_lookups: false,
        }
    }
}

/// Structured dataset snapshot location.
///
/// Without a path the pipeline runs with an empty snapshot and every
/// question takes the document-search path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDatasetConfig {
    pub path: Option<PathBuf>,
}
