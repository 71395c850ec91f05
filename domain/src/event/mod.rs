//! Pipeline lifecycle events.
//!
//! Every request produces an append-only sequence of [`PipelineEvent`]s that
//! ends with exactly one terminal event ([`EventType::FinalAnswer`] or
//! [`EventType::Error`]).

pub mod answer;

pub use answer::{AnswerCitation, AnswerMetadata, FinalAnswer};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Thought,
    Action,
    Observation,
    Validation,
    FinalAnswer,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Thought => "thought",
            EventType::Action => "action",
            EventType::Observation => "observation",
            EventType::Validation => "validation",
            EventType::FinalAnswer => "final_answer",
            EventType::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::FinalAnswer | EventType::Error)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire shape: `{type, content, data?, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(with = "rfc3339_millis")]
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(event_type: EventType, content: impl Into<String>) -> Self {
        Self {
            event_type,
            content: content.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self::new(EventType::Thought, content)
    }

    pub fn action(content: impl Into<String>) -> Self {
        Self::new(EventType::Action, content)
    }

    pub fn observation(content: impl Into<String>) -> Self {
        Self::new(EventType::Observation, content)
    }

    pub fn validation(content: impl Into<String>) -> Self {
        Self::new(EventType::Validation, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(EventType::Error, content)
    }

    /// Terminal event carrying the answer as `data`.
    pub fn final_answer(answer: &FinalAnswer) -> Self {
        let data = serde_json::to_value(answer).ok();
        Self {
            data,
            ..Self::new(EventType::FinalAnswer, answer.answer.clone())
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }

    /// Server-sent-events framing: `event: <type>\ndata: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.event_type, json)
    }
}

mod rfc3339_millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
