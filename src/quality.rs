//! Keyword-based response quality scoring
//!
//! Scores a response by the fraction of expected keywords found in it,
//! after case-folding and whitespace normalization on both sides.

/// Score a response against expected keywords.
///
/// Returns None when there is nothing to score: blank text, no keywords,
/// or only blank keywords. Otherwise the hit ratio in [0, 1], where a hit
/// is a keyword whose normalized form occurs as a substring of the
/// normalized text.
pub fn score_by_keywords(text: Option<&str>, keywords: &[String]) -> Option<f64> {
    let text = text?;
    if text.trim().is_empty() || keywords.is_empty() {
        return None;
    }

    let norm = normalize(text);
    let mut hits = 0usize;
    let mut total = 0usize;
    for kw in keywords {
        if kw.trim().is_empty() {
            continue;
        }
        total += 1;
        let k = normalize(kw);
        if !k.is_empty() && norm.contains(&k) {
            hits += 1;
        }
    }

    if total == 0 {
        return None;
    }
    Some((hits as f64 / total as f64).clamp(0.0, 1.0))
}

/// Lowercase, collapse whitespace runs (including newlines and tabs) to
/// single spaces, trim the ends.
fn normalize(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
