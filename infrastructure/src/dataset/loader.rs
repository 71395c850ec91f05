//! Reads a structured dataset snapshot from disk.
//!
//! The file holds `[[records]]` and an optional `[aliases]` table, in TOML or
//! JSON (picked by extension):
//!
//! ```toml
//! [[records]]
//! entity_type = "location_rate"
//! key = "Denver, CO"
//! representative = true
//! source_excerpt = "CO | Denver | Denver | 01/01 - 12/31 | 199 | 79"
//! fields = { lodging = 199, meals = 79 }
//! citation = { source_url = "https://example.gov/rates/co", title = "FY rates: Colorado" }
//!
//! [aliases]
//! "Arapahoe County, CO" = "Aurora, CO"
//! ```

use crate::error::{ConfigError, Result};
use ragline_domain::{AliasMap, DatasetRecord, DatasetSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Raw file contents before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFile {
    pub records: Vec<DatasetRecord>,
    pub aliases: BTreeMap<String, String>,
}

impl DatasetFile {
    pub fn into_snapshot(self) -> std::result::Result<DatasetSnapshot, ragline_domain::DomainError> {
        let aliases = AliasMap::new(self.aliases)?;
        DatasetSnapshot::new(self.records, aliases)
    }
}

pub struct DatasetLoader;

impl DatasetLoader {
    pub fn load(path: &Path) -> Result<DatasetSnapshot> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::DatasetIo {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::parse(path, &raw)?;
        let snapshot = file.into_snapshot()?;
        info!(
            "Loaded dataset {} ({} records, {} aliases)",
            path.display(),
            snapshot.record_count(),
            snapshot.aliases().len()
        );
        Ok(snapshot)
    }

    /// Empty snapshot when no dataset is configured.
    pub fn load_optional(path: Option<&Path>) -> Result<DatasetSnapshot> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(DatasetSnapshot::default()),
        }
    }

    fn parse(path: &Path, raw: &str) -> Result<DatasetFile> {
        let format_error = |message: String| ConfigError::DatasetFormat {
            path: path.to_path_buf(),
            message,
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(raw).map_err(|e| format_error(e.to_string())),
            _ => toml::from_str(raw).map_err(|e| format_error(e.to_string())),
        }
    }
}
