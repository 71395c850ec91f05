//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for the daily rolling diagnostic log. Stderr only when unset.
    pub dir: Option<PathBuf>,
    /// JSONL request transcript file. Disabled when unset.
    pub transcript: Option<PathBuf>,
}
