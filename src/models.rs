//! Data models for subreddit listings and the records written to disk.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Listing`] / [`RedditPost`]: the listing JSON returned by `/r/{sub}.json`
//!   and the OAuth API, with every field defaulted
//! - [`ProcessedPost`]: a ranked, flattened post written by the listing strategies
//! - [`FeedEntry`]: one RSS or Atom entry
//! - [`PostDetails`]: per-post stats gathered by the hybrid and scrape strategies

use serde::{Deserialize, Serialize};

/// Top level of a listing response.
#[derive(Debug, Default, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
}

/// A listing child; `kind` is `t3` for link posts.
#[derive(Debug, Default, Deserialize)]
pub struct Thing {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: RedditPost,
}

/// The subset of post fields this tool reads.
///
/// Deleted or partially redacted posts omit fields, so everything falls back
/// to a neutral value instead of failing the whole listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: i64,
    pub created_utc: f64,
    /// Path relative to the site root, e.g. `/r/macapps/comments/abc/title/`.
    pub permalink: String,
    pub url: String,
    pub selftext: String,
    pub is_self: bool,
}

impl Default for RedditPost {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            author: "[deleted]".to_string(),
            score: 0,
            upvote_ratio: 0.0,
            num_comments: 0,
            created_utc: 0.0,
            permalink: String::new(),
            url: String::new(),
            selftext: String::new(),
            is_self: false,
        }
    }
}

/// Which listing source produced a set of processed posts.
///
/// The two sources are normalized slightly differently and render different
/// readable headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFlavor {
    /// The public `.json` endpoint.
    PublicJson,
    /// The authenticated API.
    OAuth,
}

/// A post as written to `_processed.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedPost {
    /// 1-based position in the listing.
    pub rank: usize,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: f64,
    /// UTC timestamp rendered for humans.
    pub posted_date: String,
    pub permalink: String,
    pub url: String,
    /// Cleaned excerpt of the self text, or a link placeholder.
    pub content: String,
    pub is_self: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upvote_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub post_id: Option<String>,
}

/// A single entry of an RSS 2.0 or Atom feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub author: String,
    /// Publication timestamp exactly as it appears in the feed.
    pub published: String,
    /// Entry body; reddit feeds carry escaped HTML here.
    pub content: String,
}

/// A post reference found in a feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostRef {
    /// Base-36 post id taken from the `/comments/{id}/` path segment.
    pub id: String,
    pub link: String,
}

/// Per-post stats collected by the hybrid and scrape strategies.
///
/// Optional fields are omitted from JSON when a post could only be
/// partially described (for example the placeholder written when a detail
/// request fails).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostDetails {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author: Option<String>,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upvote_ratio: Option<f64>,
    pub num_comments: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_utc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    pub permalink: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selftext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_self: Option<bool>,
}

impl PostDetails {
    /// Placeholder kept when a post's detail request fails, so the link survives.
    pub fn unavailable(post: &PostRef) -> Self {
        Self {
            id: Some(post.id.clone()),
            title: "Details unavailable".to_string(),
            permalink: post.link.clone(),
            ..Self::default()
        }
    }

    /// Placeholder kept when a post page cannot be fetched or parsed.
    pub fn scrape_failed(url: &str) -> Self {
        Self {
            title: "Failed to scrape".to_string(),
            author: Some("unknown".to_string()),
            url: Some(url.to_string()),
            permalink: url.to_string(),
            selftext: Some(String::new()),
            ..Self::default()
        }
    }

    /// Author for display, `unknown` when missing.
    pub fn author_or_unknown(&self) -> &str {
        self.author.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_deserialization_with_missing_fields() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"title": "Hello", "score": 42}},
                    {"kind": "t3", "data": {}}
                ]
            }
        }"#;

        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.children.len(), 2);
        let first = &listing.data.children[0];
        assert_eq!(first.kind, "t3");
        assert_eq!(first.data.title, "Hello");
        assert_eq!(first.data.score, 42);
        assert_eq!(first.data.author, "[deleted]");
        assert_eq!(listing.data.children[1].data.num_comments, 0);
    }

    #[test]
    fn test_processed_post_omits_oauth_fields() {
        let post = ProcessedPost {
            rank: 1,
            title: "Title".to_string(),
            author: "someone".to_string(),
            score: 10,
            num_comments: 2,
            created_utc: 1_700_000_000.0,
            posted_date: "2023-11-14 22:13".to_string(),
            permalink: "https://reddit.com/r/macapps/comments/abc/title/".to_string(),
            url: String::new(),
            content: "Body".to_string(),
            is_self: true,
            upvote_ratio: None,
            post_id: None,
        };

        let json = serde_json::to_string(&post).unwrap();
        assert!(!json.contains("upvote_ratio"));
        assert!(!json.contains("post_id"));
        assert!(json.contains("\"rank\":1"));
    }

    #[test]
    fn test_unavailable_placeholder() {
        let post = PostRef {
            id: "abc123".to_string(),
            link: "https://www.reddit.com/r/macapps/comments/abc123/title/".to_string(),
        };
        let details = PostDetails::unavailable(&post);
        assert_eq!(details.title, "Details unavailable");
        assert_eq!(details.id.as_deref(), Some("abc123"));
        assert_eq!(details.score, 0);
        assert_eq!(details.author_or_unknown(), "unknown");

        let json = serde_json::to_value(&details).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_scrape_failed_placeholder() {
        let details = PostDetails::scrape_failed("https://example.com/post");
        assert_eq!(details.title, "Failed to scrape");
        assert_eq!(details.permalink, "https://example.com/post");
        assert_eq!(details.url.as_deref(), Some("https://example.com/post"));
        assert_eq!(details.author_or_unknown(), "unknown");
    }
}
