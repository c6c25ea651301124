//! Bullet extraction from markdown-like backend output.

use regex::Regex;
use std::sync::LazyLock;

/// Most bullets kept from one response.
pub const MAX_BULLETS: usize = 7;

/// Sentences taken when the response has no bullet markers.
const FALLBACK_SENTENCES: usize = 3;

static RE_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").unwrap());
static RE_IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static RE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static RE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`+([^`]*)`+").unwrap());
static RE_STRONG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\*\*|__)(.+?)(\*\*|__)").unwrap());
static RE_EM_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_EM_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b_([^_]+)_\b").unwrap());
static RE_STRIKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Strip inline markdown and residual tags, collapsing whitespace.
fn clean(text: &str) -> String {
    let text = RE_IMAGE.replace_all(text, "$1");
    let text = RE_LINK.replace_all(&text, "$1");
    let text = RE_CODE.replace_all(&text, "$1");
    let text = RE_STRONG.replace_all(&text, "$2");
    let text = RE_EM_STAR.replace_all(&text, "$1");
    let text = RE_EM_UNDERSCORE.replace_all(&text, "$1");
    let text = RE_STRIKE.replace_all(&text, "$1");
    let text = RE_TAG.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on `.`, `!` or `?` followed by whitespace, keeping the punctuation.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && let Some(&(next_idx, next)) = chars.peek()
            && next.is_whitespace()
        {
            out.push(text[start..idx + c.len_utf8()].to_string());
            start = next_idx;
        }
    }
    out.push(text[start..].to_string());
    out
}

/// Parse bullets from a backend response.
///
/// Lines starting with `-`, `*` or `+` open a bullet; other non-empty lines
/// continue the open bullet, joined with a space. Text before the first
/// bullet is ignored. With no markers at all, the first three sentences are
/// used instead. At most [`MAX_BULLETS`] are returned.
pub fn parse_bullets(raw: &str) -> Vec<String> {
    let mut bullets: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut saw_marker = false;

    for line in raw.lines() {
        if let Some(caps) = RE_BULLET.captures(line) {
            saw_marker = true;
            bullets.extend(current.take());
            current = Some(caps[1].trim().to_string());
        } else if let Some(open) = current.as_mut() {
            let line = line.trim();
            if !line.is_empty() {
                open.push(' ');
                open.push_str(line);
            }
        }
    }
    bullets.extend(current);

    if !saw_marker {
        return sentences(&clean(raw))
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(FALLBACK_SENTENCES)
            .collect();
    }

    bullets
        .iter()
        .map(|b| clean(b))
        .filter(|b| !b.is_empty())
        .take(MAX_BULLETS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markers() {
        let raw = "- First point\n* Second point\n+ Third point";
        assert_eq!(parse_bullets(raw), vec!["First point", "Second point", "Third point"]);
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let raw = "Here is the summary:\n\n- The council approved\n  the new budget.\n\n- Taxes stay flat.";
        assert_eq!(parse_bullets(raw), vec!["The council approved the new budget.", "Taxes stay flat."]);
    }

    #[test]
    fn test_inline_markup_is_stripped() {
        let raw = "- **Bold** and *italic* with `code`\n- A [link](https://example.com) and <b>tag</b>\n- snake_case stays";
        assert_eq!(
            parse_bullets(raw),
            vec!["Bold and italic with code", "A link and tag", "snake_case stays"]
        );
    }

    #[test]
    fn test_sentence_fallback_takes_three() {
        let raw = "First sentence here. Second one! Third? Fourth sentence.";
        assert_eq!(parse_bullets(raw), vec!["First sentence here.", "Second one!", "Third?"]);
    }

    #[test]
    fn test_sentence_fallback_without_punctuation() {
        assert_eq!(parse_bullets("just one fragment"), vec!["just one fragment"]);
    }

    #[test]
    fn test_caps_at_seven() {
        let raw = (1..=10).map(|i| format!("- point {i}")).collect::<Vec<_>>().join("\n");
        let bullets = parse_bullets(&raw);
        assert_eq!(bullets.len(), MAX_BULLETS);
        assert_eq!(bullets[6], "point 7");
    }

    #[test]
    fn test_empty_bullets_dropped() {
        assert_eq!(parse_bullets("- \n- real\n-   "), vec!["real"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_bullets("").is_empty());
        assert!(parse_bullets("   \n  ").is_empty());
    }
}
