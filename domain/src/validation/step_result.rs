//! Output of a dispatched plan step.

use crate::lookup::LookupResult;
use crate::plan::StepId;
use crate::retrieval::Citation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepPayload {
    /// Generated prose.
    Text { answer: String },
    /// A resolved structured record.
    Lookup(LookupResult),
    /// The step produced nothing usable.
    Failure {
        reason: String,
        /// Parameter the caller should clarify, when known.
        #[serde(default)]
        parameter: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default)]
    pub step_id: Option<StepId>,
    pub success: bool,
    pub payload: StepPayload,
    pub confidence: f64,
    pub citations: Vec<Citation>,
}

impl StepResult {
    pub fn text(answer: impl Into<String>, confidence: f64, citations: Vec<Citation>) -> Self {
        Self {
            step_id: None,
            success: true,
            payload: StepPayload::Text {
                answer: answer.into(),
            },
            confidence: crate::intent::classification::clamp_unit(confidence),
            citations,
        }
    }

    pub fn lookup(result: LookupResult) -> Self {
        Self {
            step_id: None,
            success: true,
            confidence: crate::intent::classification::clamp_unit(result.confidence),
            citations: result.citations.clone(),
            payload: StepPayload::Lookup(result),
        }
    }

    /// Unsuccessful step, always with confidence 0.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            step_id: None,
            success: false,
            payload: StepPayload::Failure {
                reason: reason.into(),
                parameter: None,
            },
            confidence: 0.0,
            citations: Vec::new(),
        }
    }

    pub fn with_step_id(mut self, id: StepId) -> Self {
        self.step_id = Some(id);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        if let StepPayload::Failure { parameter, .. } = &mut self.payload {
            *parameter = Some(name.into());
        }
        self
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }

    pub fn as_lookup(&self) -> Option<&LookupResult> {
        match &self.payload {
            StepPayload::Lookup(result) => Some(result),
            _ => None,
        }
    }

    /// Answer text shown to the user or fed to a later step.
    pub fn answer_text(&self) -> String {
        match &self.payload {
            StepPayload::Text { answer } => answer.trim().to_string(),
            StepPayload::Lookup(result) => render_lookup(result),
            StepPayload::Failure { reason, .. } => reason.clone(),
        }
    }
}

fn render_lookup(result: &LookupResult) -> String {
    let fields = result
        .payload
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value_text(value)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut text = if fields.is_empty() {
        result.candidate.canonical_key.clone()
    } else {
        format!("{}: {}", result.candidate.canonical_key, fields)
    };
    if let Some(note) = &result.note {
        text.push_str(&format!(" ({})", note));
    }
    text
}

/// Display form of a field value; integral floats lose the `.0`.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
