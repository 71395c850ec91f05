//! Token-based string similarity for the fuzzy tier.
//!
//! Scores are on a 0–100 scale. The base ratio is
//! `strsim::normalized_levenshtein`; on top of it:
//!
//! | Metric | Insensitive to |
//! |--------|----------------|
//! | [`token_sort_ratio`] | word order |
//! | [`token_set_ratio`] | word order and extra words on one side |
//! | [`similarity`] | mean of both |
//!
//! Averaging keeps the set ratio's tolerance for reordering while the sort
//! ratio penalizes a short input that is merely a subset of a long key
//! ("Springs" vs "Colorado Springs").

use crate::core::string::word_tokens;
use std::collections::BTreeSet;

/// Plain edit-distance ratio, 0–100.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Ratio after sorting the lowercase word tokens of both sides.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let mut ta = word_tokens(a);
    let mut tb = word_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    ta.sort();
    tb.sort();
    ratio(&ta.join(" "), &tb.join(" "))
}

/// Ratio over the shared token set plus each side's remainder.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let sa: BTreeSet<String> = word_tokens(a).into_iter().collect();
    let sb: BTreeSet<String> = word_tokens(b).into_iter().collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }

    let join = |set: Vec<&String>| {
        set.into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let shared = join(sa.intersection(&sb).collect());
    let only_a = join(sa.difference(&sb).collect());
    let only_b = join(sb.difference(&sa).collect());

    let combined_a = format!("{} {}", shared, only_a).trim().to_string();
    let combined_b = format!("{} {}", shared, only_b).trim().to_string();

    if shared.is_empty() {
        return ratio(&combined_a, &combined_b);
    }

    ratio(&shared, &combined_a)
        .max(ratio(&shared, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// Similarity used by the resolver: mean of sort and set ratios.
pub fn similarity(a: &str, b: &str) -> f64 {
    (token_sort_ratio(a, b) + token_set_ratio(a, b)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_identical_is_100() {
        assert!(close(similarity("Denver", "denver"), 100.0));
        assert!(close(similarity("Fort Collins", "collins fort"), 100.0));
    }

    #[test]
    fn test_typo_scores_above_threshold() {
        // one deletion in six characters
        let score = similarity("Denvr", "Denver");
        assert!(close(score, 83.33), "got {}", score);
        assert!(similarity("Colorado Sprngs", "Colorado Springs") >= 80.0);
    }

    #[test]
    fn test_subset_input_penalized() {
        let score = similarity("Springs", "Colorado Springs");
        assert!(score < 80.0, "got {}", score);
        assert!(close(token_set_ratio("Springs", "Colorado Springs"), 100.0));
    }

    #[test]
    fn test_unrelated_is_low() {
        assert!(similarity("Boulder", "Miami") < 40.0);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(similarity("", "Denver"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(ratio("", ""), 0.0);
    }

    #[test]
    fn test_symmetric_and_deterministic() {
        let a = similarity("Grand Junction", "Grand Junctoin");
        let b = similarity("Grand Junctoin", "Grand Junction");
        assert_eq!(a, b);
        assert_eq!(a, similarity("Grand Junction", "Grand Junctoin"));
    }
}
