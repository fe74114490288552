//! Word-order tolerant string similarity on a 0-100 scale.
//!
//! Both metrics sit on top of normalized Levenshtein similarity. Empty input
//! on either side scores 0: a blank field is absence of evidence, not a match.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Plain edit-distance similarity, 0-100.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b) * 100.0
}

/// Similarity after sorting each side's tokens, so "smith john" and
/// "john smith" score 100.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Similarity over token sets. Shared tokens are compared against each
/// side's full token set; when one side's tokens are a subset of the
/// other's the score is 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = join(tokens_a.intersection(&tokens_b));
    let diff_ab = join(tokens_a.difference(&tokens_b));
    let diff_ba = join(tokens_b.difference(&tokens_a));

    if intersection.is_empty() {
        return ratio(&diff_ab, &diff_ba);
    }
    if diff_ab.is_empty() || diff_ba.is_empty() {
        return 100.0;
    }

    let combined_ab = format!("{intersection} {diff_ab}");
    let combined_ba = format!("{intersection} {diff_ba}");

    ratio(&intersection, &combined_ab)
        .max(ratio(&intersection, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join<'a, 'b: 'a>(tokens: impl Iterator<Item = &'a &'b str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}
