//! Primary-content extraction from fetched HTML.
//!
//! ### Candidate regions
//! Candidates are collected in priority order and each is converted to plain
//! text and scored:
//! 1. `<main>` regions
//! 2. `<article>` regions
//! 3. `<section>`/`<div>` whose `id` or `class` contains a content keyword
//!    (`content`, `article`, `main`, `body`, `post`, `entry`, `read`)
//!
//! If none of these exist, the `<body>` (or the whole document) is the only
//! candidate. The highest score wins; on a tie the earlier region wins.
//!
//! ### Stable Abstraction
//! - The `Extractor` trait keeps the resolver independent of the heuristics.

pub mod preamble;
pub mod sanitize;
pub mod score;

pub use preamble::{ProxyDocument, parse_proxy_output};
pub use sanitize::{MAX_CONTENT_CHARS, decode_entities, html_to_text, sanitize};
pub use score::{MAX_SCORE, score};

use scraper::{ElementRef, Html, Selector};

/// Attribute keywords that mark a container as likely main content.
pub const CONTENT_KEYWORDS: &[&str] = &["content", "article", "main", "body", "post", "entry", "read"];

/// Which part of the document a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Main,
    Article,
    Container,
    Body,
    Document,
}

/// One scored block of plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub region: Region,
    pub text: String,
    pub score: u32,
}

/// Result of extracting a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub title: Option<String>,
    pub text: String,
    pub score: u32,
    pub region: Region,
}

/// Extracts the primary content block of an HTML document.
pub trait Extractor: Send + Sync {
    /// Best candidate, or `None` when the document has no text at all.
    fn extract(&self, html: &str) -> Option<Extraction>;
}

/// Region heuristics plus quality scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralExtractor;

impl Extractor for StructuralExtractor {
    fn extract(&self, html: &str) -> Option<Extraction> {
        let document = Html::parse_document(html);
        let title = title_of(&document);
        let best = best_candidate(collect_candidates(&document))?;
        Some(Extraction { title, text: best.text, score: best.score, region: best.region })
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

fn candidate(region: Region, element: ElementRef<'_>) -> Option<Candidate> {
    let text = html_to_text(&element.html());
    if text.is_empty() {
        return None;
    }
    let score = score(&text);
    Some(Candidate { region, text, score })
}

fn has_content_keyword(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    [value.id(), value.attr("class")]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|attr| CONTENT_KEYWORDS.iter().any(|kw| attr.contains(kw)))
}

fn collect_candidates(document: &Html) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for element in document.select(&selector("main")) {
        candidates.extend(candidate(Region::Main, element));
    }
    for element in document.select(&selector("article")) {
        candidates.extend(candidate(Region::Article, element));
    }
    for element in document.select(&selector("section, div")).filter(has_content_keyword) {
        candidates.extend(candidate(Region::Container, element));
    }

    if candidates.is_empty() {
        let fallback = match document.select(&selector("body")).next() {
            Some(body) => candidate(Region::Body, body),
            None => candidate(Region::Document, document.root_element()),
        };
        candidates.extend(fallback);
    }

    candidates
}

/// Candidate regions of `html`, in priority order.
pub fn extract_candidates(html: &str) -> Vec<Candidate> {
    collect_candidates(&Html::parse_document(html))
}

/// Highest-scoring candidate; the earliest wins ties.
pub fn best_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        if best.as_ref().is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    best
}

fn collapse(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn title_of(document: &Html) -> Option<String> {
    let from_title = document
        .select(&selector("title"))
        .next()
        .and_then(|el| collapse(&el.text().collect::<String>()));

    from_title
        .or_else(|| {
            document
                .select(&selector(r#"meta[property="og:title"]"#))
                .next()
                .and_then(|el| el.value().attr("content"))
                .and_then(collapse)
        })
        .or_else(|| {
            document
                .select(&selector("h1"))
                .next()
                .and_then(|el| collapse(&el.text().collect::<Vec<_>>().join(" ")))
        })
}

/// Document title: `<title>`, else `og:title`, else the first `<h1>`.
pub fn extract_title(html: &str) -> Option<String> {
    title_of(&Html::parse_document(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(topic: &str) -> String {
        (0..12)
            .map(|i| format!("The {topic} report covers point {i} in careful and considerable detail here."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_main_region_preferred_over_body() {
        let html = format!(
            "<html><body><nav>Home About Contact</nav><main><p>{}</p><p>{}</p></main><footer>(c) 2024</footer></body></html>",
            paragraph("budget"),
            paragraph("housing")
        );
        let candidates = extract_candidates(&html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].region, Region::Main);
        assert!(!candidates[0].text.contains("Contact"));
    }

    #[test]
    fn test_candidates_follow_priority_order() {
        let html = format!(
            r#"<body><div class="post-body"><p>{}</p></div><article><p>{}</p></article><main><p>{}</p></main></body>"#,
            paragraph("a"),
            paragraph("b"),
            paragraph("c")
        );
        let regions: Vec<Region> = extract_candidates(&html).into_iter().map(|c| c.region).collect();
        assert_eq!(regions, vec![Region::Main, Region::Article, Region::Container]);
    }

    #[test]
    fn test_keyword_match_on_id() {
        let html = r#"<body><section id="ReadingPane"><p>Hello there.</p></section><div id="sidebar">Ads</div></body>"#;
        let candidates = extract_candidates(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].region, Region::Container);
        assert_eq!(candidates[0].text, "Hello there.");
    }

    #[test]
    fn test_body_fallback() {
        let html = "<html><body><p>Just a body.</p></body></html>";
        let candidates = extract_candidates(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].region, Region::Body);
        assert_eq!(candidates[0].text, "Just a body.");
    }

    #[test]
    fn test_best_candidate_highest_score_wins() {
        let html = format!(
            "<body><main><p>Short teaser.</p></main><article><p>{}</p><p>{}</p></article></body>",
            paragraph("science"),
            paragraph("policy")
        );
        let extraction = StructuralExtractor.extract(&html).unwrap();
        assert_eq!(extraction.region, Region::Article);
        assert!(extraction.score >= 5);
    }

    #[test]
    fn test_best_candidate_tie_keeps_earlier() {
        let a = Candidate { region: Region::Main, text: "a".into(), score: 3 };
        let b = Candidate { region: Region::Article, text: "b".into(), score: 3 };
        assert_eq!(best_candidate(vec![a.clone(), b]).unwrap(), a);
        assert!(best_candidate(Vec::new()).is_none());
    }

    #[test]
    fn test_empty_document_yields_nothing() {
        assert!(StructuralExtractor.extract("<html><body>   </body></html>").is_none());
    }

    #[test]
    fn test_title_sources_in_order() {
        assert_eq!(
            extract_title("<html><head><title> Page \n Title </title></head><body><h1>H</h1></body></html>").as_deref(),
            Some("Page Title")
        );
        assert_eq!(
            extract_title(r#"<html><head><meta property="og:title" content="OG Title"></head><body><h1>H</h1></body></html>"#)
                .as_deref(),
            Some("OG Title")
        );
        assert_eq!(extract_title("<html><body><h1>Heading <em>One</em></h1></body></html>").as_deref(), Some("Heading One"));
        assert_eq!(extract_title("<html><body><p>none</p></body></html>"), None);
    }
}
