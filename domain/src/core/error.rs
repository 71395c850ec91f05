//! Domain error types

use thiserror::Error;

/// Domain-level errors.
///
/// These are reserved for invariant violations detected while building
/// reference data (dataset snapshot, alias map, plans). Per-request failures
/// are carried as typed results instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::InvalidPlan("cycle".to_string()).is_cancelled());
        assert!(!DomainError::InvalidDataset("dup".to_string()).is_cancelled());
    }
}
