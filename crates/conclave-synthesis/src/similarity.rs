//! Textual similarity.
//!
//! The measure used everywhere a threshold applies (deliberation
//! early-termination, consensus-extraction agreement): cosine similarity
//! over lowercase word-frequency vectors. Deterministic, symmetric, and
//! bounded to `[0, 1]`; identical texts score 1.0, texts sharing no
//! words score 0.0.

use std::collections::HashMap;

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut freqs: HashMap<String, f64> = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *freqs.entry(word.to_lowercase()).or_insert(0.0) += 1.0;
    }
    freqs
}

/// Cosine similarity of two texts' word-frequency vectors, in `[0, 1]`.
///
/// Two texts with no words at all count as identical (1.0); one empty
/// against one non-empty counts as disjoint (0.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let fa = term_frequencies(a);
    let fb = term_frequencies(b);

    if fa.is_empty() && fb.is_empty() {
        return 1.0;
    }
    if fa.is_empty() || fb.is_empty() {
        return 0.0;
    }

    let dot: f64 = fa
        .iter()
        .filter_map(|(term, &wa)| fb.get(term).map(|&wb| wa * wb))
        .sum();
    let norm_a: f64 = fa.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = fb.values().map(|w| w * w).sum::<f64>().sqrt();

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Mean pairwise similarity over a set of texts.
///
/// A single text (or none) has nothing to disagree with and scores 1.0.
pub fn mean_pairwise(texts: &[&str]) -> f64 {
    if texts.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0u32;
    for i in 0..texts.len() {
        for j in (i + 1)..texts.len() {
            total += similarity(texts[i], texts[j]);
            pairs += 1;
        }
    }
    total / pairs as f64
}
