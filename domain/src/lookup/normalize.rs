//! Normalize stage: canonical case, whitespace and region codes.
//!
//! The canonical form is `Locality, CODE` when a scope is recognized,
//! `Locality` when it is not, and `CODE` for a bare region. The result of
//! [`normalize`] is a fixed point: `normalize(normalize(x).canonical) ==
//! normalize(x)`.

use super::region::{MAX_NAME_TOKENS, RegionTable};
use crate::core::string::title_case_token;
use serde::{Deserialize, Serialize};

/// An input split into its locality part and region scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub locality: Option<String>,
    /// Region short code.
    pub scope: Option<String>,
    pub canonical: String,
}

impl NormalizedQuery {
    fn build(locality: Option<String>, scope: Option<&str>) -> Self {
        let locality = locality.filter(|l| !l.is_empty());
        let canonical = match (&locality, scope) {
            (Some(l), Some(s)) => format!("{}, {}", l, s),
            (Some(l), None) => l.clone(),
            (None, Some(s)) => s.to_string(),
            (None, None) => String::new(),
        };
        Self {
            locality,
            scope: scope.map(str::to_string),
            canonical,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Passes after which a still-changing input is returned as is.
const MAX_PASSES: usize = 8;

/// Canonicalize a free-form entity string.
///
/// A single pass can expose a new match (case folding a non-ASCII letter
/// onto a region name), so passes repeat until the canonical form settles.
pub fn normalize(input: &str) -> NormalizedQuery {
    let mut current = normalize_once(input);
    for _ in 1..MAX_PASSES {
        let next = normalize_once(&current.canonical);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_once(input: &str) -> NormalizedQuery {
    let cleaned = clean(input);
    let segments: Vec<&str> = cleaned.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();

    if segments.len() >= 2
        && let Some((last, head)) = segments.split_last()
        && let Some(region) = RegionTable::lookup(last)
    {
        let locality = head
            .iter()
            .map(|s| title_case_phrase(s))
            .collect::<Vec<_>>()
            .join(", ");
        return NormalizedQuery::build(Some(locality), Some(region.code));
    }

    normalize_unscoped(&segments.join(" "))
}

fn normalize_unscoped(text: &str) -> NormalizedQuery {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return NormalizedQuery::build(None, None);
    }

    if let Some(region) = RegionTable::lookup(text) {
        return NormalizedQuery::build(None, Some(region.code));
    }

    // Trailing full region name, longest first ("... west virginia").
    let max_tail = MAX_NAME_TOKENS.min(tokens.len() - 1);
    for n in (1..=max_tail).rev() {
        let split = tokens.len() - n;
        if let Some(region) = RegionTable::by_name(&tokens[split..].join(" ")) {
            let locality = title_case_phrase(&tokens[..split].join(" "));
            return NormalizedQuery::build(Some(locality), Some(region.code));
        }
    }

    // Trailing code without a comma only counts when written in capitals,
    // so "portland or" stays a locality.
    if tokens.len() >= 2 {
        let last = tokens[tokens.len() - 1];
        if last.len() == 2
            && last.chars().all(|c| c.is_ascii_uppercase())
            && let Some(region) = RegionTable::by_code(last)
        {
            let locality = title_case_phrase(&tokens[..tokens.len() - 1].join(" "));
            return NormalizedQuery::build(Some(locality), Some(region.code));
        }
    }

    NormalizedQuery::build(Some(title_case_phrase(text)), None)
}

fn title_case_phrase(s: &str) -> String {
    s.split_whitespace()
        .map(title_case_token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop characters that never appear in keys and tidy token edges.
///
/// Output is comma-separated segments of cleaned tokens, `"a b, c"`.
fn clean(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ',' | '-' | '.' | '\'' | '&') {
                c
            } else {
                ' '
            }
        })
        .collect();

    mapped
        .split(',')
        .map(|segment| {
            segment
                .split_whitespace()
                .map(clean_token)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trims edge hyphens and quotes, and sentence-final periods on tokens
/// longer than an abbreviation like "St.", until nothing changes.
fn clean_token(token: &str) -> &str {
    let mut body = token;
    loop {
        let mut next = body.trim_matches(|c| c == '-' || c == '\'');
        if next.chars().count() > 3 {
            next = next.trim_end_matches('.');
        }
        if next == body {
            return body;
        }
        body = next;
    }
}
