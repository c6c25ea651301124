//! Heuristic "is this article content" scoring.
//!
//! Scores only rank candidates against each other. The one absolute use is
//! the resolver's high-confidence threshold.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Highest score [`score`] can return.
pub const MAX_SCORE: u32 = 10;

static RE_SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+\s+").unwrap());
static RE_PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

fn tier(value: usize, thresholds: &[usize]) -> u32 {
    thresholds.iter().filter(|&&t| value >= t).count() as u32
}

/// Score a block of plain text from 0 to [`MAX_SCORE`].
///
/// Four additive signals:
/// - word count: 60 / 100 / 180 words give +1 / +2 / +3
/// - distinct lowercased words: 25 / 50 / 90 give +1 / +2 / +3
/// - sentences of at least 40 characters: 2 / 4 give +1 / +2
/// - paragraphs of at least 160 characters: 1 / 2 give +1 / +2
pub fn score(text: &str) -> u32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    let distinct: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();

    let long_sentences = RE_SENTENCE_END
        .split(text)
        .filter(|s| s.trim().chars().count() >= 40)
        .count();

    let long_paragraphs = RE_PARAGRAPH_BREAK
        .split(text)
        .filter(|p| p.trim().chars().count() >= 160)
        .count();

    let total = tier(words.len(), &[60, 100, 180])
        + tier(distinct.len(), &[25, 50, 90])
        + tier(long_sentences, &[2, 4])
        + tier(long_paragraphs, &[1, 2]);

    total.min(MAX_SCORE)
}
