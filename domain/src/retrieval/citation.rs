//! Citation value object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a piece of an answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source_url: String,
    pub title: String,
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl Citation {
    pub fn new(source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            title: title.into(),
            retrieved_at: None,
        }
    }

    pub fn retrieved_at(mut self, at: DateTime<Utc>) -> Self {
        self.retrieved_at = Some(at);
        self
    }

    /// A citation counts only if it points somewhere.
    pub fn is_valid(&self) -> bool {
        !self.source_url.trim().is_empty()
    }
}
