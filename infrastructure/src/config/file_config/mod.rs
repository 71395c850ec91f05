//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod logging;
mod output;
mod pipeline;
mod provider;
mod store;

pub use logging::FileLoggingConfig;
pub use output::FileOutputConfig;
pub use pipeline::{FilePipelineConfig, FileResolverConfig};
pub use provider::FileProviderConfig;
pub use store::{FileDatasetConfig, FileStoreConfig};

use ragline_application::PipelineParams;
use ragline_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Language provider endpoint and models
    pub provider: FileProviderConfig,
    /// Vector store endpoint
    pub store: FileStoreConfig,
    /// Structured dataset snapshot
    pub dataset: FileDatasetConfig,
    /// Thresholds, retries and retrieval limits
    pub pipeline: FilePipelineConfig,
    /// Fuzzy lookup tiers
    pub resolver: FileResolverConfig,
    /// Diagnostic log and transcript files
    pub logging: FileLoggingConfig,
    /// Output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// This is the single entry point for config validation. It checks:
    /// 1. Pipeline thresholds, retry cap and limits
    /// 2. Resolver tier scores
    /// 3. Endpoint URLs and timeouts
    /// 4. The dataset file, when one is configured
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.pipeline.to_params().1);
        issues.extend(self.resolver.to_resolver_config().1);

        for (field, url) in [
            ("provider.base_url", &self.provider.base_url),
            ("store.url", &self.store.url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidUrl,
                    format!("{}: '{}' is not an http(s) URL", field, url),
                ));
            }
        }

        for (field, secs) in [
            ("provider.timeout_secs", self.provider.timeout_secs),
            ("store.timeout_secs", self.store.timeout_secs),
        ] {
            if secs == 0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::ZeroLimit,
                    format!("{} must be greater than 0, using the default", field),
                ));
            }
        }

        if let Some(path) = &self.dataset.path
            && !path.exists()
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::MissingDataset,
                format!("dataset.path: {} does not exist", path.display()),
            ));
        }

        issues
    }

    /// Everything the pipeline needs, with invalid values already replaced
    /// by their defaults.
    pub fn to_pipeline_params(&self) -> PipelineParams {
        let (params, _) = self.pipeline.to_params();
        let (resolver, _) = self.resolver.to_resolver_config();
        let call_timeout = match self.provider.timeout_secs {
            0 => PipelineParams::default().call_timeout,
            secs => Duration::from_secs(secs),
        };
        params
            .with_resolver(resolver)
            .with_call_timeout(call_timeout)
            .with_hydrate_lookups(self.store.hydrate_lookups)
    }
}
