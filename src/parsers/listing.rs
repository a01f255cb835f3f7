//! Listing JSON validation and normalization.

use crate::http::FetchError;
use crate::models::{Listing, ListingFlavor, PostDetails, ProcessedPost, RedditPost};
use crate::utils::{clean_markdown, excerpt, format_timestamp, truncate_chars};
use serde::Deserialize;
use serde_json::Value;

/// Site root prepended to relative permalinks.
pub const PERMALINK_BASE: &str = "https://reddit.com";

const CONTENT_EXCERPT_CHARS: usize = 500;
const DETAIL_SELFTEXT_CHARS: usize = 300;

/// A listing must be a JSON object with a `data` member.
pub fn validate_listing(value: &Value) -> Result<(), FetchError> {
    match value {
        Value::Object(map) if map.contains_key("data") => Ok(()),
        _ => Err(FetchError::InvalidPayload(
            "listing is not an object with a `data` member".to_string(),
        )),
    }
}

/// Validate and decode a listing.
pub fn parse_listing(value: &Value) -> Result<Listing, FetchError> {
    validate_listing(value)?;
    Ok(Listing::deserialize(value)?)
}

/// Flatten and rank the posts of a listing.
///
/// Ranks follow listing order starting at 1. The public endpoint gets its
/// markdown stripped; the API flavor keeps the raw text but gains
/// `upvote_ratio` and `post_id`.
pub fn process_posts(listing: &Listing, flavor: ListingFlavor) -> Vec<ProcessedPost> {
    listing
        .data
        .children
        .iter()
        .enumerate()
        .map(|(i, thing)| process_post(i + 1, &thing.data, flavor))
        .collect()
}

fn process_post(rank: usize, p: &RedditPost, flavor: ListingFlavor) -> ProcessedPost {
    let body = match flavor {
        ListingFlavor::PublicJson => clean_markdown(&p.selftext),
        ListingFlavor::OAuth => p.selftext.clone(),
    };
    let url_or_na = if p.url.is_empty() { "N/A" } else { p.url.as_str() };

    let content = if body.is_empty() {
        match flavor {
            ListingFlavor::PublicJson => format!("[Link/Image Post - URL: {}]", url_or_na),
            ListingFlavor::OAuth => format!("[Link Post - URL: {}]", url_or_na),
        }
    } else {
        excerpt(&body, CONTENT_EXCERPT_CHARS)
    };

    let (posted_fmt, upvote_ratio, post_id) = match flavor {
        ListingFlavor::PublicJson => ("%Y-%m-%d %H:%M", None, None),
        ListingFlavor::OAuth => ("%Y-%m-%d %H:%M:%S", Some(p.upvote_ratio), Some(p.id.clone())),
    };

    ProcessedPost {
        rank,
        title: p.title.clone(),
        author: p.author.clone(),
        score: p.score,
        num_comments: p.num_comments,
        created_utc: p.created_utc,
        posted_date: format_timestamp(p.created_utc, posted_fmt),
        permalink: format!("{}{}", PERMALINK_BASE, p.permalink),
        url: p.url.clone(),
        content,
        is_self: p.is_self,
        upvote_ratio,
        post_id,
    }
}

/// Extract post stats from a single-post response.
///
/// The endpoint returns `[post listing, comment listing]`; the post is the
/// first child of the first listing.
pub fn post_details(value: &Value) -> Result<PostDetails, FetchError> {
    let first = value
        .as_array()
        .and_then(|listings| listings.first())
        .ok_or_else(|| FetchError::InvalidPayload("expected a non-empty array".to_string()))?;
    let post_value = first
        .pointer("/data/children/0/data")
        .ok_or_else(|| FetchError::InvalidPayload("post listing has no children".to_string()))?;
    let p = RedditPost::deserialize(post_value)?;

    let title = if p.title.is_empty() { "No title".to_string() } else { p.title };
    Ok(PostDetails {
        id: Some(p.id),
        title,
        author: Some(p.author),
        score: p.score,
        upvote_ratio: Some(p.upvote_ratio),
        num_comments: p.num_comments,
        created_utc: Some(p.created_utc),
        url: Some(p.url),
        permalink: format!("{}{}", PERMALINK_BASE, p.permalink),
        selftext: Some(truncate_chars(&p.selftext, DETAIL_SELFTEXT_CHARS)),
        is_self: Some(p.is_self),
    })
}
