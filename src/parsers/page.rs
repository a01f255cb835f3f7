//! Heuristic extraction of post stats from a post's HTML page.
//!
//! Nothing here is a stable contract: the selectors and patterns match markup
//! that the site changes at will, and any field that cannot be found falls
//! back to a neutral value.

use crate::models::PostDetails;
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static TITLE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r" : r/\w+$").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)").unwrap());
static SCORE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)score").unwrap());
static UPVOTE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)upvote").unwrap());
static AUTHOR_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)author").unwrap());
static CONTENT_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)content|text|post").unwrap());
static COMMENT_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)([0-9]+)\s*comment").unwrap(),
        Regex::new(r"(?i)([0-9]+)\s*discussion").unwrap(),
    ]
});

static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SCORE_CANDIDATES: Lazy<Selector> = Lazy::new(|| Selector::parse("div, span, button").unwrap());
static AUTHOR_CANDIDATES: Lazy<Selector> = Lazy::new(|| Selector::parse("a, span").unwrap());
static DIVS: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

const SELFTEXT_CHARS: usize = 300;

/// Extract title, score, comment count, author, and an excerpt from a page.
pub fn scrape_post_page(html: &str, url: &str) -> PostDetails {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let score = extract_score(&document);
    let num_comments = extract_comment_count(&document);
    let author = extract_author(&document);
    let selftext = extract_selftext(&document);

    debug!(%url, %score, %num_comments, %author, "Scraped post page");

    PostDetails {
        title,
        author: Some(author),
        score,
        num_comments,
        url: Some(url.to_string()),
        permalink: url.to_string(),
        selftext: Some(selftext),
        ..PostDetails::default()
    }
}

/// Text of an element with each fragment trimmed and empty ones dropped.
fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_title(document: &Html) -> String {
    let raw = document
        .select(&H1)
        .next()
        .or_else(|| document.select(&TITLE).next())
        .map(stripped_text)
        .unwrap_or_default();

    if raw.is_empty() {
        return "No title".to_string();
    }
    TITLE_SUFFIX.replace(&raw, "").into_owned()
}

fn has_score_class(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("class")
        .is_some_and(|c| SCORE_CLASS.is_match(c))
}

fn has_data_score(el: &ElementRef<'_>) -> bool {
    el.value().attr("data-score").is_some()
}

fn has_upvote_label(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("aria-label")
        .is_some_and(|l| UPVOTE_LABEL.is_match(l))
}

/// The first candidate pattern whose element yields digits wins; JSON-LD is
/// the last resort.
fn extract_score(document: &Html) -> i64 {
    let patterns: [fn(&ElementRef<'_>) -> bool; 3] =
        [has_score_class, has_data_score, has_upvote_label];

    for matches in patterns {
        let Some(el) = document.select(&SCORE_CANDIDATES).find(|el| matches(el)) else {
            continue;
        };
        let value = el.value();
        let source = value
            .attr("data-score")
            .or_else(|| value.attr("aria-label"))
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>());
        if let Some(score) = first_number(&source) {
            return score;
        }
    }

    json_ld_upvotes(document).unwrap_or(0)
}

fn json_ld_upvotes(document: &Html) -> Option<i64> {
    let script = document.select(&JSON_LD).next()?;
    let raw = script.text().collect::<String>();
    let data: serde_json::Value = serde_json::from_str(&raw).ok()?;
    data.as_object()?.get("upvoteCount")?.as_i64()
}

fn extract_comment_count(document: &Html) -> i64 {
    let text = document.root_element().text().collect::<String>();
    COMMENT_PATTERNS
        .iter()
        .find_map(|pattern| {
            pattern
                .captures(&text)
                .map(|caps| saturating_count(&caps[1]))
        })
        .unwrap_or(0)
}

fn extract_author(document: &Html) -> String {
    let author = document
        .select(&AUTHOR_CANDIDATES)
        .find(|el| {
            el.value()
                .attr("class")
                .is_some_and(|c| AUTHOR_CLASS.is_match(c))
        })
        .map(stripped_text)
        .unwrap_or_default();

    let author = author
        .strip_prefix("/u/")
        .or_else(|| author.strip_prefix("u/"))
        .unwrap_or(&author)
        .to_string();
    if author.is_empty() { "unknown".to_string() } else { author }
}

fn extract_selftext(document: &Html) -> String {
    document
        .select(&DIVS)
        .find(|el| {
            el.value()
                .attr("class")
                .is_some_and(|c| CONTENT_CLASS.is_match(c))
        })
        .map(|el| truncate_chars(&stripped_text(el), SELFTEXT_CHARS))
        .unwrap_or_default()
}

fn first_number(s: &str) -> Option<i64> {
    DIGITS.captures(s).map(|caps| saturating_count(&caps[1]))
}

/// Parse a run of ASCII digits, clamping overlong runs to `i64::MAX`.
fn saturating_count(digits: &str) -> i64 {
    digits.parse::<i64>().unwrap_or(i64::MAX)
}
