//! Text normalization for every content source.
//!
//! Live documents, direct fetches and proxy renderings all pass through
//! [`sanitize`] so their output is comparable for scoring and fingerprinting.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Upper bound on sanitized text, in characters.
///
/// Text is cut hard at this length, mid-sentence if need be.
pub const MAX_CONTENT_CHARS: usize = 12_000;

static RE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static RE_STYLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static RE_HEAD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>").unwrap());
static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(?:p|h[1-6])\s*>").unwrap());
static RE_BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</(?:div|section|article|main|header|footer|aside|nav|ul|ol|tr|table|blockquote|pre|figure|figcaption|dd|dt)\s*>",
    )
    .unwrap()
});
static RE_LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|<li\b[^>]*>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").unwrap());

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}')
}

/// Normalize raw text into clean, bounded plain text.
///
/// Every whitespace variant becomes a space or a newline, control and
/// zero-width characters are dropped, runs of spaces collapse to one, and
/// runs of blank lines collapse to a single blank line. The result is
/// trimmed and cut to [`MAX_CONTENT_CHARS`].
pub fn sanitize(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    normalized.push('\n');
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' | '\u{000B}' | '\u{000C}' | '\u{0085}' => normalized.push('\n'),
            c if is_zero_width(c) => {}
            c if c.is_whitespace() => normalized.push(' '),
            c if c.is_control() => {}
            c => normalized.push(c),
        }
    }

    let mut out = String::with_capacity(normalized.len());
    let mut blank_run = 0usize;
    for line in normalized.split('\n') {
        let line = line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }

    truncate_chars(out, MAX_CONTENT_CHARS)
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
    }
    text
}

/// Convert an HTML fragment or document into sanitized plain text.
///
/// `<script>`, `<style>` and `<head>` blocks are removed with their content.
/// Paragraph and heading ends become blank lines; other block ends, `<br>`
/// and list items become line breaks. Remaining tags are stripped and
/// entities decoded before [`sanitize`] runs.
pub fn html_to_text(html: &str) -> String {
    let text = RE_SCRIPT.replace_all(html, " ");
    let text = RE_STYLE.replace_all(&text, " ");
    let text = RE_HEAD.replace_all(&text, " ");
    let text = RE_COMMENT.replace_all(&text, " ");
    let text = RE_PARAGRAPH_END.replace_all(&text, "\n\n");
    let text = RE_BLOCK_END.replace_all(&text, "\n");
    let text = RE_LINE_BREAK.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, "");
    sanitize(&decode_entities(&text))
}

/// Decode named and numeric character references.
///
/// Unknown names are left as written.
pub fn decode_entities(text: &str) -> String {
    RE_ENTITY
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(name)
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "middot" => '\u{00B7}',
        "bull" => '\u{2022}',
        _ => return None,
    };
    Some(c)
}
