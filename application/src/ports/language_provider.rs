//! Language provider port
//!
//! Defines the interface for the external language-understanding and
//! generation provider.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during provider calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    #[error("Provider timed out")]
    Timeout,

    #[error("Malformed provider output: {0}")]
    Malformed(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether another attempt may succeed.
    ///
    /// Malformed output is retried by the caller with a different prompt,
    /// not by blind repetition.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Unreachable(_) | ProviderError::Timeout => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Malformed(_) | ProviderError::Cancelled => false,
        }
    }
}

/// Which configured model a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Classifier,
    Generator,
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// Ask the provider to constrain its reply to JSON.
    pub expect_structured: bool,
    pub role: ModelRole,
}

impl GenerateRequest {
    pub fn structured(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            expect_structured: true,
            role: ModelRole::Classifier,
        }
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            expect_structured: false,
            role: ModelRole::Generator,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Gateway to the language model
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LanguageProvider: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError>;

    /// Names of the models the provider can serve.
    async fn health(&self) -> Result<Vec<String>, ProviderError>;
}

/// Turns text into an embedding vector for search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Unreachable("refused".into()).is_retryable());
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!ProviderError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!ProviderError::Malformed("x".into()).is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
    }

    #[test]
    fn test_request_constructors() {
        let r = GenerateRequest::structured("p");
        assert!(r.expect_structured);
        assert_eq!(r.role, ModelRole::Classifier);
        let t = GenerateRequest::text("p").with_system("s");
        assert!(!t.expect_structured);
        assert_eq!(t.system.as_deref(), Some("s"));
    }
}
