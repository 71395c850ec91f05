//! Configuration file loading for ragline
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `RAGLINE_` environment variables (`__` separates section and key)
//! 2. `--config <path>` specified file
//! 3. Project root: `./ragline.toml` or `./.ragline.toml`
//! 4. Global: `$XDG_CONFIG_HOME/ragline/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileConfig, FileDatasetConfig, FileLoggingConfig, FileOutputConfig, FilePipelineConfig,
    FileProviderConfig, FileResolverConfig, FileStoreConfig,
};
pub use loader::ConfigLoader;
