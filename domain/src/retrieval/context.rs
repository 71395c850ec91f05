//! Context assembly for generation.
//!
//! [`build_context`] turns ranked chunks into the text block handed to the
//! generator:
//!
//! 1. Order by relevance (stable on ties, so input order breaks them)
//! 2. Collapse near-duplicates, keeping the more relevant chunk
//! 3. Fill the token budget from the top; the first chunk that does not fit
//!    ends the context
//! 4. Number sources and list citations by first appearance

use super::citation::Citation;
use crate::core::string::{truncate_str, word_tokens};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A ranked chunk returned by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    /// Relevance reported by the store; higher is better.
    pub score: f64,
    pub citation: Citation,
}

/// Limits applied while assembling context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub max_tokens: usize,
    /// Jaccard similarity above which two chunks count as the same.
    pub dedupe_threshold: f64,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            dedupe_threshold: 0.9,
        }
    }
}

/// Output of [`build_context`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Ids of the chunks included, in context order.
    pub used_chunks: Vec<String>,
    /// Highest relevance among included chunks, 0 when empty.
    pub top_score: f64,
    pub duplicates_dropped: usize,
    pub truncated: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.used_chunks.is_empty()
    }
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

pub fn build_context(chunks: &[RetrievedChunk], budget: &ContextBudget) -> AssembledContext {
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    order.sort_by(|&a, &b| relevance(&chunks[b]).total_cmp(&relevance(&chunks[a])));

    // Deduplicate
    let mut kept: Vec<(usize, BTreeSet<String>)> = Vec::new();
    let mut duplicates_dropped = 0;
    for idx in order {
        let tokens: BTreeSet<String> = word_tokens(&chunks[idx].text).into_iter().collect();
        let duplicate = kept
            .iter()
            .any(|(_, other)| jaccard(&tokens, other) > budget.dedupe_threshold);
        if duplicate {
            duplicates_dropped += 1;
        } else {
            kept.push((idx, tokens));
        }
    }

    // Truncate to budget
    let mut included: Vec<(usize, &str)> = Vec::new();
    let mut used_tokens: usize = 0;
    let mut truncated = 0;
    for (position, (idx, _)) in kept.iter().enumerate() {
        let text = chunks[*idx].text.trim();
        let cost = estimate_tokens(text);
        if used_tokens.saturating_add(cost) <= budget.max_tokens {
            used_tokens += cost;
            included.push((*idx, text));
        } else {
            if included.is_empty() && budget.max_tokens > 0 {
                // Never return an empty context because the best chunk is long.
                included.push((*idx, truncate_str(text, budget.max_tokens.saturating_mul(4))));
                truncated += kept.len() - position - 1;
            } else {
                truncated += kept.len() - position;
            }
            break;
        }
    }

    // Number sources by first appearance
    let mut citations: Vec<Citation> = Vec::new();
    let mut text = String::new();
    for (idx, body) in &included {
        let citation = &chunks[*idx].citation;
        let number = match citations
            .iter()
            .position(|c| c.source_url == citation.source_url)
        {
            Some(pos) => pos + 1,
            None => {
                citations.push(citation.clone());
                citations.len()
            }
        };
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&format!("[{}] {}\n{}", number, citation.title, body));
    }

    AssembledContext {
        text,
        citations,
        used_chunks: included.iter().map(|(i, _)| chunks[*i].id.clone()).collect(),
        top_score: included
            .first()
            .map(|(i, _)| relevance(&chunks[*i]))
            .unwrap_or(0.0),
        duplicates_dropped,
        truncated,
    }
}

fn relevance(chunk: &RetrievedChunk) -> f64 {
    if chunk.score.is_nan() { 0.0 } else { chunk.score }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    shared / union
}
