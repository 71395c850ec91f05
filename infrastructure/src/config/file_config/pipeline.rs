//! Pipeline and resolver configuration (`[pipeline]`, `[resolver]` sections)

use ragline_application::{MAX_RETRIES_CAP, PipelineParams};
use ragline_domain::{ConfigIssue, ConfigIssueCode, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline knobs from TOML.
///
/// # Example
///
/// ```toml
/// [pipeline]
/// accept_threshold = 0.75
/// max_retries = 1
/// top_k = 12
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    pub accept_threshold: f64,
    pub clarify_threshold: f64,
    pub classification_threshold: f64,
    pub max_retries: u32,
    pub top_k: usize,
    pub context_token_budget: usize,
    pub dedupe_threshold: f64,
    pub provider_max_attempts: u32,
    pub backoff_base_ms: u64,
    pub step_timeout_secs: u64,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        let params = PipelineParams::default();
        Self {
            accept_threshold: params.accept_threshold,
            clarify_threshold: params.clarify_threshold,
            classification_threshold: params.classification_threshold,
            max_retries: params.max_retries,
            top_k: params.top_k,
            context_token_budget: params.context_token_budget,
            dedupe_threshold: params.dedupe_threshold,
            provider_max_attempts: params.provider_max_attempts,
            backoff_base_ms: params.backoff_base.as_millis() as u64,
            step_timeout_secs: params.step_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResolverConfig {
    /// Minimum similarity (0-100) for a fuzzy match.
    pub fuzzy_threshold: f64,
    /// Score given to a scope-representative fallback.
    pub fallback_score_cap: f64,
}

impl Default for FileResolverConfig {
    fn default() -> Self {
        let config = ResolverConfig::default();
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            fallback_score_cap: config.fallback_score_cap,
        }
    }
}

impl FileResolverConfig {
    /// Convert to the domain config; out-of-range values fall back with a
    /// warning.
    pub fn to_resolver_config(&self) -> (ResolverConfig, Vec<ConfigIssue>) {
        let defaults = ResolverConfig::default();
        let mut issues = Vec::new();
        let fuzzy_threshold = percent(
            "resolver.fuzzy_threshold",
            self.fuzzy_threshold,
            defaults.fuzzy_threshold,
            &mut issues,
        );
        let fallback_score_cap = percent(
            "resolver.fallback_score_cap",
            self.fallback_score_cap,
            defaults.fallback_score_cap,
            &mut issues,
        );
        (
            ResolverConfig {
                fuzzy_threshold,
                fallback_score_cap,
                ..defaults
            },
            issues,
        )
    }
}

impl FilePipelineConfig {
    /// Convert to [`PipelineParams`], returning validation issues.
    ///
    /// Invalid values fall back to their defaults with a warning. A clarify
    /// threshold that is not below the accept threshold is an error, since
    /// no single default repairs the pair.
    pub fn to_params(&self) -> (PipelineParams, Vec<ConfigIssue>) {
        let defaults = PipelineParams::default();
        let mut issues = Vec::new();

        let accept = unit("pipeline.accept_threshold", self.accept_threshold, defaults.accept_threshold, &mut issues);
        let clarify = unit("pipeline.clarify_threshold", self.clarify_threshold, defaults.clarify_threshold, &mut issues);
        if clarify >= accept {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ThresholdOrder,
                format!(
                    "pipeline.clarify_threshold ({}) must be below pipeline.accept_threshold ({})",
                    clarify, accept
                ),
            ));
        }
        let classification = unit(
            "pipeline.classification_threshold",
            self.classification_threshold,
            defaults.classification_threshold,
            &mut issues,
        );
        let dedupe = unit("pipeline.dedupe_threshold", self.dedupe_threshold, defaults.dedupe_threshold, &mut issues);

        if self.max_retries > MAX_RETRIES_CAP {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::RetriesClamped,
                format!(
                    "pipeline.max_retries {} exceeds the cap; using {}",
                    self.max_retries, MAX_RETRIES_CAP
                ),
            ));
        }

        let top_k = nonzero("pipeline.top_k", self.top_k, defaults.top_k, &mut issues);
        let budget = nonzero(
            "pipeline.context_token_budget",
            self.context_token_budget,
            defaults.context_token_budget,
            &mut issues,
        );
        let attempts = nonzero(
            "pipeline.provider_max_attempts",
            self.provider_max_attempts as usize,
            defaults.provider_max_attempts as usize,
            &mut issues,
        );
        let step_timeout = nonzero(
            "pipeline.step_timeout_secs",
            self.step_timeout_secs as usize,
            defaults.step_timeout.as_secs() as usize,
            &mut issues,
        );

        let params = defaults
            .with_thresholds(accept, clarify)
            .with_classification_threshold(classification)
            .with_max_retries(self.max_retries.min(MAX_RETRIES_CAP))
            .with_top_k(top_k)
            .with_context_budget(budget, dedupe)
            .with_provider_retry(attempts as u32, Duration::from_millis(self.backoff_base_ms))
            .with_step_timeout(Duration::from_secs(step_timeout as u64));
        (params, issues)
    }
}

fn unit(field: &str, value: f64, default: f64, issues: &mut Vec<ConfigIssue>) -> f64 {
    in_range(field, value, 1.0, default, issues)
}

fn percent(field: &str, value: f64, default: f64, issues: &mut Vec<ConfigIssue>) -> f64 {
    in_range(field, value, 100.0, default, issues)
}

fn in_range(field: &str, value: f64, max: f64, default: f64, issues: &mut Vec<ConfigIssue>) -> f64 {
    if (0.0..=max).contains(&value) {
        return value;
    }
    issues.push(ConfigIssue::warning(
        ConfigIssueCode::OutOfRange,
        format!("{}: {} is outside [0, {}], using {}", field, value, max, default),
    ));
    default
}

fn nonzero(field: &str, value: usize, default: usize, issues: &mut Vec<ConfigIssue>) -> usize {
    if value > 0 {
        return value;
    }
    issues.push(ConfigIssue::warning(
        ConfigIssueCode::ZeroLimit,
        format!("{} must be greater than 0, using {}", field, default),
    ));
    default
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_domain::Severity;

    #[test]
    fn test_defaults_round_trip_to_params() {
        let (params, issues) = FilePipelineConfig::default().to_params();
        assert!(issues.is_empty());
        assert_eq!(params.top_k, 8);
        assert_eq!(params.context_token_budget, 3000);
        assert_eq!(params.backoff_base, Duration::from_millis(250));
        assert_eq!(params.step_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_out_of_range_threshold_falls_back() {
        let config = FilePipelineConfig {
            accept_threshold: 1.5,
            ..FilePipelineConfig::default()
        };
        let (params, issues) = config.to_params();
        assert_eq!(params.accept_threshold, 0.7);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::OutOfRange);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_inverted_thresholds_are_an_error() {
        let config = FilePipelineConfig {
            accept_threshold: 0.5,
            clarify_threshold: 0.6,
            ..FilePipelineConfig::default()
        };
        let (_, issues) = config.to_params();
        assert!(ConfigIssue::has_errors(&issues));
        assert_eq!(issues[0].code, ConfigIssueCode::ThresholdOrder);
    }

    #[test]
    fn test_retries_are_clamped() {
        let config = FilePipelineConfig {
            max_retries: 7,
            ..FilePipelineConfig::default()
        };
        let (params, issues) = config.to_params();
        assert_eq!(params.max_retries, MAX_RETRIES_CAP);
        assert_eq!(issues[0].code, ConfigIssueCode::RetriesClamped);
    }

    #[test]
    fn test_zero_limits_fall_back() {
        let config = FilePipelineConfig {
            top_k: 0,
            step_timeout_secs: 0,
            ..FilePipelineConfig::default()
        };
        let (params, issues) = config.to_params();
        assert_eq!(params.top_k, 8);
        assert_eq!(params.step_timeout, Duration::from_secs(60));
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.code == ConfigIssueCode::ZeroLimit));
    }

    #[test]
    fn test_resolver_section() {
        let toml_str = r#"
[resolver]
fuzzy_threshold = 85.0
fallback_score_cap = 140.0
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let (resolver, issues) = config.resolver.to_resolver_config();
        assert_eq!(resolver.fuzzy_threshold, 85.0);
        assert_eq!(resolver.fallback_score_cap, 50.0);
        assert_eq!(resolver.alias_score, 95.0);
        assert_eq!(issues.len(), 1);
    }
}
