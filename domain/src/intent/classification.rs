//! Classification entity and intent enumeration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// The fixed set of intents a question can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    StructuredLookup,
    GeneralRag,
    ClarificationNeeded,
    MultiStep,
    Comparison,
    Definition,
    HowTo,
    Troubleshooting,
}

impl IntentType {
    pub const ALL: [IntentType; 8] = [
        IntentType::StructuredLookup,
        IntentType::GeneralRag,
        IntentType::ClarificationNeeded,
        IntentType::MultiStep,
        IntentType::Comparison,
        IntentType::Definition,
        IntentType::HowTo,
        IntentType::Troubleshooting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::StructuredLookup => "structured_lookup",
            IntentType::GeneralRag => "general_rag",
            IntentType::ClarificationNeeded => "clarification_needed",
            IntentType::MultiStep => "multi_step",
            IntentType::Comparison => "comparison",
            IntentType::Definition => "definition",
            IntentType::HowTo => "how_to",
            IntentType::Troubleshooting => "troubleshooting",
        }
    }

    /// One-line description used when enumerating intents in prompts.
    pub fn description(&self) -> &'static str {
        match self {
            IntentType::StructuredLookup => {
                "a specific value from a structured table (rates, amounts) for a named entity"
            }
            IntentType::GeneralRag => "a general question answered from the document corpus",
            IntentType::ClarificationNeeded => "too vague or ambiguous to answer as asked",
            IntentType::MultiStep => "needs several dependent sub-questions answered in order",
            IntentType::Comparison => "compares two or more entities or options",
            IntentType::Definition => "asks what a term or concept means",
            IntentType::HowTo => "asks for a procedure or steps",
            IntentType::Troubleshooting => "describes a problem and asks how to fix it",
        }
    }

    /// Whether questions of this intent are decomposed into sub-questions.
    pub fn is_decomposable(&self) -> bool {
        matches!(self, IntentType::MultiStep | IntentType::Comparison)
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IntentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        IntentType::ALL
            .iter()
            .find(|intent| intent.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown intent type: {}", s))
    }
}

/// Name of a structured table family (e.g. `location_rate`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of classifying a question.
///
/// Created once per request and read-only afterwards. `entity_type` is
/// always present when `intent_type` is [`IntentType::StructuredLookup`];
/// [`parse_classification`](super::parse_classification) downgrades replies
/// that break this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent_type: IntentType,
    pub entity_type: Option<EntityType>,
    pub extracted_params: BTreeMap<String, String>,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    /// Sub-questions proposed by the provider for decomposable intents.
    #[serde(default)]
    pub sub_questions: Vec<String>,
    #[serde(default)]
    pub clarification_question: Option<String>,
    /// The provider's intent when the confidence gate overrode it.
    #[serde(default)]
    pub original_intent: Option<IntentType>,
    /// Set when the provider could not be used and this is the fallback.
    #[serde(default)]
    pub degraded: bool,
}

impl Classification {
    pub fn new(intent_type: IntentType, confidence: f64) -> Self {
        Self {
            intent_type,
            entity_type: None,
            extracted_params: BTreeMap::new(),
            confidence: clamp_unit(confidence),
            reasoning: String::new(),
            sub_questions: Vec::new(),
            clarification_question: None,
            original_intent: None,
            degraded: false,
        }
    }

    /// Classification used when the provider is exhausted.
    pub fn fallback(reason: impl Into<String>) -> Self {
        let mut c = Self::new(IntentType::GeneralRag, 0.0);
        c.reasoning = reason.into();
        c.degraded = true;
        c
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extracted_params.insert(key.into(), value.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_sub_questions(mut self, sub_questions: Vec<String>) -> Self {
        self.sub_questions = sub_questions;
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.extracted_params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Force `clarification_needed` when confidence is below `threshold`.
    ///
    /// Degraded fallbacks are exempt so that they can still take the
    /// general RAG path.
    pub fn apply_confidence_threshold(mut self, threshold: f64) -> Self {
        if !self.degraded
            && self.confidence < threshold
            && self.intent_type != IntentType::ClarificationNeeded
        {
            self.original_intent = Some(self.intent_type);
            self.intent_type = IntentType::ClarificationNeeded;
        }
        self
    }

    pub fn needs_clarification(&self) -> bool {
        self.intent_type == IntentType::ClarificationNeeded
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
