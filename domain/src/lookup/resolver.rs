//! Structured lookup resolver.
//!
//! Resolution runs as a fixed cascade and stops at the first tier that
//! produces a candidate:
//!
//! ```text
//! Normalize → AliasResolve → ExactMatch → FuzzyMatch → ScopeFallback → Fail
//! ```
//!
//! | Tier | Score |
//! |------|-------|
//! | exact | 100 |
//! | alias | `alias_score` (95) |
//! | fuzzy | similarity, at least `fuzzy_threshold` (80) |
//! | fallback | `fallback_score_cap` (50) |
//!
//! Failures are returned as [`LookupFailure`] values; nothing here panics.

use super::dataset::{DatasetSnapshot, DatasetTable, TableEntry};
use super::normalize::{NormalizedQuery, normalize};
use super::region::RegionTable;
use super::similarity::similarity;
use crate::intent::EntityType;
use crate::retrieval::Citation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Tier that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Alias,
    Fuzzy,
    Fallback,
}

impl MatchType {
    pub fn as_str(&self) -> &str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Alias => "alias",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupCandidate {
    pub canonical_key: String,
    pub match_type: MatchType,
    /// 0–100.
    pub score: f64,
}

/// A resolved record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub candidate: LookupCandidate,
    pub payload: BTreeMap<String, Value>,
    pub citations: Vec<Citation>,
    /// `score / 100`.
    pub confidence: f64,
    pub note: Option<String>,
    pub source_excerpt: Option<String>,
    /// Input as received.
    pub query: String,
    /// Input after normalization (before alias substitution).
    pub normalized: String,
}

impl LookupResult {
    pub fn is_fallback(&self) -> bool {
        self.candidate.match_type == MatchType::Fallback
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupFailure {
    #[error("No {entity_type} entry matches '{query}'")]
    NotFound { entity_type: String, query: String },

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Nothing to look up")]
    EmptyInput,
}

/// Tier scores and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub fuzzy_threshold: f64,
    pub fallback_score_cap: f64,
    pub alias_score: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 80.0,
            fallback_score_cap: 50.0,
            alias_score: 95.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructuredResolver {
    config: ResolverConfig,
}

impl StructuredResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(
        &self,
        snapshot: &DatasetSnapshot,
        entity_type: &EntityType,
        text: &str,
    ) -> Result<LookupResult, LookupFailure> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(LookupFailure::EmptyInput);
        }
        let table = snapshot
            .table(entity_type)
            .ok_or_else(|| LookupFailure::UnknownEntityType(entity_type.to_string()))?;

        let finish = |entry: &TableEntry, match_type, score, note| {
            build_result(entry, match_type, score, note, text, &normalized)
        };

        // An input that is itself a key beats any alias defined for it.
        if let Some(entry) = table.get(&normalized.canonical) {
            return Ok(finish(entry, MatchType::Exact, 100.0, None));
        }

        let mut target = normalized.clone();
        if let Some(alias) = snapshot.aliases().resolve(&normalized) {
            if let Some(entry) = table.get(alias) {
                return Ok(finish(entry, MatchType::Alias, self.config.alias_score, None));
            }
            // Alias points outside this table; keep matching on the target.
            target = normalize(alias);
        }

        if let Some((entry, score)) = self.fuzzy_match(table, &target) {
            return Ok(finish(entry, MatchType::Fuzzy, score, None));
        }

        let scope = target.scope.as_deref().or(normalized.scope.as_deref());
        if let Some(scope) = scope
            && let Some(entry) = table.representative(scope)
        {
            let region = RegionTable::name_for(scope).unwrap_or(scope);
            let note = format!(
                "No entry matched '{}'; using the {} representative entry {}",
                normalized.canonical,
                region,
                entry.canonical_key()
            );
            return Ok(finish(
                entry,
                MatchType::Fallback,
                self.config.fallback_score_cap.min(100.0),
                Some(note),
            ));
        }

        Err(LookupFailure::NotFound {
            entity_type: entity_type.to_string(),
            query: normalized.canonical,
        })
    }

    /// Best locality match within the query's scope, if it clears the
    /// threshold.
    fn fuzzy_match<'a>(
        &self,
        table: &'a DatasetTable,
        query: &NormalizedQuery,
    ) -> Option<(&'a TableEntry, f64)> {
        let locality = query.locality.as_deref()?;
        let scope = query.scope.as_deref();

        table
            .entries_in(scope)
            .filter_map(|entry| {
                let candidate = entry.normalized.locality.as_deref()?;
                let score = similarity(locality, candidate);
                (score >= self.config.fuzzy_threshold).then_some((entry, score))
            })
            .min_by(|a, b| rank(a, b, scope))
    }
}

/// Ordering where the preferred candidate sorts first.
fn rank(a: &(&TableEntry, f64), b: &(&TableEntry, f64), scope: Option<&str>) -> Ordering {
    let shares_scope = |e: &TableEntry| scope.is_some() && e.normalized.scope.as_deref() == scope;
    b.1.total_cmp(&a.1)
        .then_with(|| shares_scope(b.0).cmp(&shares_scope(a.0)))
        .then_with(|| a.0.canonical_key().len().cmp(&b.0.canonical_key().len()))
        .then_with(|| a.0.canonical_key().cmp(b.0.canonical_key()))
}

fn build_result(
    entry: &TableEntry,
    match_type: MatchType,
    score: f64,
    tier_note: Option<String>,
    query: &str,
    normalized: &NormalizedQuery,
) -> LookupResult {
    let score = score.clamp(0.0, 100.0);
    let note = match (tier_note, &entry.record.note) {
        (Some(tier), Some(record)) => Some(format!("{}. {}", tier, record)),
        (Some(tier), None) => Some(tier),
        (None, record) => record.clone(),
    };
    LookupResult {
        candidate: LookupCandidate {
            canonical_key: entry.canonical_key().to_string(),
            match_type,
            score,
        },
        payload: entry.record.fields.clone(),
        citations: entry
            .record
            .citation
            .iter()
            .filter(|c| c.is_valid())
            .cloned()
            .collect(),
        confidence: score / 100.0,
        note,
        source_excerpt: entry.record.source_excerpt.clone(),
        query: query.to_string(),
        normalized: normalized.canonical.clone(),
    }
}
