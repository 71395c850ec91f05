//! Response validation.
//!
//! A result is scored on four weighted dimensions and then accepted, sent
//! back for a retry, or turned into a clarification request. Validation is
//! a pure function of `(question, result)`: calling it twice yields the
//! same [`ValidationResult`].

use super::step_result::{StepPayload, StepResult, value_text};
use crate::core::question::Question;
use crate::core::string::{truncate_str, word_tokens};
use crate::event::FinalAnswer;
use crate::lookup::{LookupResult, MatchType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const RELEVANCE_WEIGHT: f64 = 0.40;
pub const COMPLETENESS_WEIGHT: f64 = 0.25;
pub const CITATION_WEIGHT: f64 = 0.20;
pub const ACCURACY_WEIGHT: f64 = 0.15;

/// Valid citations needed for a full citation sub-score.
const CITATIONS_FOR_FULL_CREDIT: usize = 2;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "from", "how", "i", "in", "is", "it",
    "me", "my", "of", "on", "or", "our", "should", "the", "to", "was", "we", "what", "when",
    "where", "which", "who", "why", "will", "with", "you", "your",
];

const REFUSALS: &[&str] = &[
    "i don't know",
    "i do not know",
    "cannot answer",
    "can't answer",
    "no information",
    "not enough information",
    "unable to",
    "not mentioned in the context",
];

/// Thresholds for the accept / retry / clarify decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub accept_threshold: f64,
    pub clarify_threshold: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            accept_threshold: 0.7,
            clarify_threshold: 0.4,
        }
    }
}

/// Per-dimension sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub completeness: f64,
    pub citation: f64,
    pub accuracy: f64,
}

impl ScoreBreakdown {
    pub fn weighted(&self) -> f64 {
        let total = self.relevance * RELEVANCE_WEIGHT
            + self.completeness * COMPLETENESS_WEIGHT
            + self.citation * CITATION_WEIGHT
            + self.accuracy * ACCURACY_WEIGHT;
        total.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Retry,
    Clarify,
}

impl Decision {
    pub fn as_str(&self) -> &str {
        match self {
            Decision::Accept => "accept",
            Decision::Retry => "retry",
            Decision::Clarify => "clarify",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Question put back to the user when a result is too weak to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub parameter: String,
    pub question: String,
}

impl Clarification {
    pub fn for_parameter(parameter: &str, original: &str) -> Self {
        let question = match parameter {
            "location" => "Which location do you mean? Please include the city and state, \
                           for example \"Denver, CO\"."
                .to_string(),
            other => format!(
                "Could you clarify the {} of your question \"{}\"?",
                other,
                truncate_str(original, 120)
            ),
        };
        Self {
            parameter: parameter.to_string(),
            question,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub issues: Vec<String>,
    pub decision: Decision,
    /// Present only when `decision` is accept.
    pub final_answer: Option<FinalAnswer>,
    /// Present only when `decision` is clarify.
    pub clarification: Option<Clarification>,
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        self.decision == Decision::Accept
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    policy: ValidationPolicy,
}

impl ResponseValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn validate(&self, question: &Question, result: &StepResult) -> ValidationResult {
        let mut issues = Vec::new();
        let valid_citations = result.citations.iter().filter(|c| c.is_valid()).count();

        let mut breakdown = match &result.payload {
            StepPayload::Failure { reason, .. } => {
                issues.push(format!("step failed: {}", reason));
                ScoreBreakdown::default()
            }
            StepPayload::Lookup(lookup) => score_lookup(lookup, &mut issues),
            StepPayload::Text { answer } => score_text(question.content(), answer, &mut issues),
        };
        if !result.success {
            breakdown = ScoreBreakdown::default();
        }

        breakdown.citation = citation_score(valid_citations);
        if valid_citations == 0 {
            issues.push("no citations".to_string());
            breakdown.accuracy = 0.0;
        }

        let score = breakdown.weighted();
        let decision = if score >= self.policy.accept_threshold {
            Decision::Accept
        } else if score >= self.policy.clarify_threshold {
            Decision::Retry
        } else {
            Decision::Clarify
        };

        let final_answer = (decision == Decision::Accept).then(|| {
            FinalAnswer::new(result.answer_text(), score).with_citations(&result.citations)
        });
        let clarification = (decision == Decision::Clarify)
            .then(|| Clarification::for_parameter(&ambiguous_parameter(result), question.content()));

        ValidationResult {
            score,
            breakdown,
            issues,
            decision,
            final_answer,
            clarification,
        }
    }
}

/// `min(valid, 2) / 2`; never decreases as valid citations are added.
pub fn citation_score(valid_citations: usize) -> f64 {
    valid_citations.min(CITATIONS_FOR_FULL_CREDIT) as f64 / CITATIONS_FOR_FULL_CREDIT as f64
}

fn ambiguous_parameter(result: &StepResult) -> String {
    match &result.payload {
        StepPayload::Failure {
            parameter: Some(p), ..
        } => p.clone(),
        StepPayload::Lookup(_) => "location".to_string(),
        _ => "topic".to_string(),
    }
}

/// Whether `needle` occurs in `haystack` as a whole value: "199" matches
/// "$199" and "$199.00" but not "1999", "1,199" or "199.5".
fn appears_bounded(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let mut before = haystack[..start].chars().rev();
        let before_ok = match before.next() {
            Some(c) if c.is_alphanumeric() => false,
            Some('.' | ',') => !before.next().is_some_and(|c| c.is_ascii_digit()),
            _ => true,
        };

        let rest = &haystack[start + needle.len()..];
        let mut after = rest.chars();
        let after_ok = match after.next() {
            Some(c) if c.is_alphanumeric() => false,
            Some(sep @ ('.' | ',')) => {
                let digits: String = after.take_while(|c| c.is_ascii_digit()).collect();
                digits.is_empty() || (sep == '.' && digits.chars().all(|d| d == '0'))
            }
            _ => true,
        };

        before_ok && after_ok
    })
}

fn score_lookup(lookup: &LookupResult, issues: &mut Vec<String>) -> ScoreBreakdown {
    let relevance = lookup.confidence.clamp(0.0, 1.0);

    let mut completeness: f64 = if lookup.payload.is_empty() {
        issues.push("lookup returned no fields".to_string());
        0.3
    } else {
        1.0
    };
    if lookup.candidate.match_type == MatchType::Fallback {
        issues.push(format!(
            "fallback entry {} used for '{}'",
            lookup.candidate.canonical_key, lookup.query
        ));
        completeness = completeness.min(0.5);
    }

    let accuracy = match &lookup.source_excerpt {
        Some(excerpt) if !lookup.payload.is_empty() => {
            let haystack = excerpt.to_lowercase();
            let consistent = lookup
                .payload
                .values()
                .filter(|v| appears_bounded(&haystack, &value_text(v).to_lowercase()))
                .count();
            if consistent < lookup.payload.len() {
                issues.push(format!(
                    "{} of {} fields not found in source row",
                    lookup.payload.len() - consistent,
                    lookup.payload.len()
                ));
            }
            consistent as f64 / lookup.payload.len() as f64
        }
        _ => {
            issues.push("no source row to check fields against".to_string());
            0.0
        }
    };

    ScoreBreakdown {
        relevance,
        completeness,
        citation: 0.0,
        accuracy,
    }
}

fn score_text(question: &str, answer: &str, issues: &mut Vec<String>) -> ScoreBreakdown {
    let terms = content_terms(question);
    let answer_terms = stems(answer);
    let relevance = if answer.trim().is_empty() {
        0.0
    } else if terms.is_empty() {
        0.5
    } else {
        let missing: Vec<&str> = terms
            .iter()
            .filter(|t| !answer_terms.contains(*t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            issues.push(format!("answer does not mention: {}", missing.join(", ")));
        }
        (terms.len() - missing.len()) as f64 / terms.len() as f64
    };

    let lowered = answer.to_lowercase();
    let words = answer.split_whitespace().count();
    let completeness = if words == 0 {
        issues.push("empty answer".to_string());
        0.0
    } else if REFUSALS.iter().any(|r| lowered.contains(r)) {
        issues.push("answer declines to answer".to_string());
        0.2
    } else if words < 5 {
        0.4
    } else if words < 15 {
        0.7
    } else {
        1.0
    };

    ScoreBreakdown {
        relevance,
        completeness,
        citation: 0.0,
        accuracy: coherence(answer),
    }
}

/// Share of well-formed sentences, discounted by repetition.
fn coherence(text: &str) -> f64 {
    let sentences: Vec<String> = text
        .split(['.', '!', '?', '\n'])
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let total = sentences.len() as f64;
    let well_formed = sentences
        .iter()
        .filter(|s| s.split_whitespace().count() >= 3)
        .count() as f64;
    let unique = sentences.iter().collect::<BTreeSet<_>>().len() as f64;
    (well_formed / total) * (unique / total)
}

fn stem(token: &str) -> String {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

fn stems(text: &str) -> BTreeSet<String> {
    word_tokens(text).iter().map(|t| stem(t)).collect()
}

fn content_terms(question: &str) -> BTreeSet<String> {
    word_tokens(question)
        .iter()
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .map(|t| stem(t))
        .collect()
}
