//! Structured configuration issues.
//!
//! Config validation reports problems as [`ConfigIssue`] values instead of
//! failing on the first one, so every problem in a file is shown at once.
//! Warnings fall back to a default; any error is fatal at startup.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a default is used instead.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A threshold or weight lies outside [0, 1] (or [0, 100] for scores).
    OutOfRange,
    /// `clarify_threshold` is not below `accept_threshold`.
    ThresholdOrder,
    /// More Validator retries than the pipeline allows.
    RetriesClamped,
    /// A timeout or budget of zero.
    ZeroLimit,
    /// An endpoint URL that does not look like http(s).
    InvalidUrl,
    /// The dataset file is configured but missing.
    MissingDataset,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Returns true if any issue is fatal.
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{}] {}", level, self.message)
    }
}
