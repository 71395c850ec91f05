//! Pipeline parameters: per-request loop control.
//!
//! [`PipelineParams`] groups the static knobs that control the ask pipeline:
//! thresholds, the retry budget, retrieval limits, and timeouts. These are
//! application-layer concerns; the scoring rules themselves live in the
//! domain.

use crate::use_cases::shared::RetryPolicy;
use ragline_domain::{ContextBudget, ResolverConfig, ValidationPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on Validator-triggered retries per request.
pub const MAX_RETRIES_CAP: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Validation score needed to accept a result.
    pub accept_threshold: f64,
    /// Below this score the user is asked to clarify.
    pub clarify_threshold: f64,
    /// Classifier confidence below which the question is clarified.
    pub classification_threshold: f64,
    /// Validator-triggered retries; capped at [`MAX_RETRIES_CAP`].
    pub max_retries: u32,
    /// Chunks requested from the vector store.
    pub top_k: usize,
    pub context_token_budget: usize,
    pub dedupe_threshold: f64,
    /// Attempts per provider call, including the first.
    pub provider_max_attempts: u32,
    pub backoff_base: Duration,
    /// Per-call timeout for provider and store calls.
    pub call_timeout: Duration,
    /// Budget for one plan step.
    pub step_timeout: Duration,
    pub resolver: ResolverConfig,
    /// Re-fetch resolved records from the store before answering.
    pub hydrate_lookups: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            accept_threshold: 0.7,
            clarify_threshold: 0.4,
            classification_threshold: 0.7,
            max_retries: MAX_RETRIES_CAP,
            top_k: 8,
            context_token_budget: 3000,
            dedupe_threshold: 0.9,
            provider_max_attempts: 3,
            backoff_base: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
            step_timeout: Duration::from_secs(60),
            resolver: ResolverConfig::default(),
            hydrate_lookups: false,
        }
    }
}

impl PipelineParams {
    // ==================== Builder Methods ====================

    pub fn with_thresholds(mut self, accept: f64, clarify: f64) -> Self {
        self.accept_threshold = accept;
        self.clarify_threshold = clarify;
        self
    }

    pub fn with_classification_threshold(mut self, threshold: f64) -> Self {
        self.classification_threshold = threshold;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_context_budget(mut self, tokens: usize, dedupe_threshold: f64) -> Self {
        self.context_token_budget = tokens;
        self.dedupe_threshold = dedupe_threshold;
        self
    }

    pub fn with_provider_retry(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.provider_max_attempts = max_attempts;
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_hydrate_lookups(mut self, hydrate: bool) -> Self {
        self.hydrate_lookups = hydrate;
        self
    }

    // ==================== Derived Settings ====================

    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.min(MAX_RETRIES_CAP)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            accept_threshold: self.accept_threshold,
            clarify_threshold: self.clarify_threshold,
        }
    }

    pub fn context_budget(&self) -> ContextBudget {
        ContextBudget {
            max_tokens: self.context_token_budget,
            dedupe_threshold: self.dedupe_threshold,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.provider_max_attempts.max(1),
            backoff_base: self.backoff_base,
            call_timeout: self.call_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = PipelineParams::default();
        assert_eq!(params.accept_threshold, 0.7);
        assert_eq!(params.clarify_threshold, 0.4);
        assert_eq!(params.max_retries, 2);
        assert_eq!(params.top_k, 8);
        assert!(!params.hydrate_lookups);
    }

    #[test]
    fn test_builder() {
        let params = PipelineParams::default()
            .with_max_retries(1)
            .with_top_k(4)
            .with_step_timeout(Duration::from_secs(5));
        assert_eq!(params.max_retries, 1);
        assert_eq!(params.top_k, 4);
        assert_eq!(params.step_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_retries_capped() {
        let params = PipelineParams::default().with_max_retries(10);
        assert_eq!(params.effective_max_retries(), MAX_RETRIES_CAP);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let params = PipelineParams::default().with_provider_retry(0, Duration::ZERO);
        assert_eq!(params.retry_policy().max_attempts, 1);
    }
}
