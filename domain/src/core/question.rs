//! Question value object

use serde::{Deserialize, Serialize};

/// A question received from the caller (Value Object)
///
/// Immutable once constructed. Carries an optional session identifier
/// that is echoed back in transcripts and answer metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    content: String,
    session_id: Option<String>,
}

impl Question {
    /// Try to create a new question, returning None if the content is blank
    pub fn try_new(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            None
        } else {
            Some(Self {
                content,
                session_id: None,
            })
        }
    }

    /// Attach a session identifier
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        let id = session_id.into();
        self.session_id = if id.trim().is_empty() { None } else { Some(id) };
        self
    }

    /// Get the question content
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}
