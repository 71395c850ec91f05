//! Final answer returned to the caller.

use crate::retrieval::Citation;
use serde::{Deserialize, Serialize};

/// `{url, title}` as exposed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCitation {
    pub url: String,
    pub title: String,
}

impl From<&Citation> for AnswerCitation {
    fn from(c: &Citation) -> Self {
        Self {
            url: c.source_url.clone(),
            title: c.title.clone(),
        }
    }
}

/// Request bookkeeping attached by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub intent: String,
    pub strategy: Option<String>,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub validation_score: f64,
    #[serde(default)]
    pub clarification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub answer: String,
    pub citations: Vec<AnswerCitation>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnswerMetadata>,
}

impl FinalAnswer {
    pub fn new(answer: impl Into<String>, confidence: f64) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            confidence: crate::intent::classification::clamp_unit(confidence),
            metadata: None,
        }
    }

    /// Adds citations, skipping invalid ones and repeated URLs.
    pub fn with_citations<'a>(mut self, citations: impl IntoIterator<Item = &'a Citation>) -> Self {
        for citation in citations {
            if citation.is_valid() && !self.citations.iter().any(|c| c.url == citation.source_url) {
                self.citations.push(citation.into());
            }
        }
        self
    }

    pub fn with_metadata(mut self, metadata: AnswerMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_clarification(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.clarification)
    }
}
