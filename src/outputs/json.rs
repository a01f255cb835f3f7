//! JSON documents: raw listings, processed posts, ranked posts, and the
//! listing-shaped wrapper around feed entries.
//!
//! Everything is pretty-printed with two-space indentation; non-ASCII text is
//! written as UTF-8, not escaped.

use crate::models::FeedEntry;
use crate::utils::truncate_chars;
use chrono::Utc;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const FEED_SELFTEXT_CHARS: usize = 500;

/// Feed entries dressed up as a listing so downstream tools read one shape.
#[derive(Debug, Serialize)]
struct FeedListing<'a> {
    kind: &'static str,
    data: FeedListingData<'a>,
    source: &'static str,
    collected_at: String,
}

#[derive(Debug, Serialize)]
struct FeedListingData<'a> {
    children: Vec<FeedThing<'a>>,
}

#[derive(Debug, Serialize)]
struct FeedThing<'a> {
    kind: &'static str,
    data: FeedPost<'a>,
}

#[derive(Debug, Serialize)]
struct FeedPost<'a> {
    title: &'a str,
    author: &'a str,
    url: &'a str,
    permalink: &'a str,
    /// The feed's own timestamp string, not a unix time.
    created_utc: &'a str,
    selftext: String,
}

impl<'a> FeedListing<'a> {
    fn new(entries: &'a [FeedEntry], collected_at: String) -> Self {
        let children = entries
            .iter()
            .map(|entry| FeedThing {
                kind: "t3",
                data: FeedPost {
                    title: &entry.title,
                    author: &entry.author,
                    url: &entry.link,
                    permalink: &entry.link,
                    created_utc: &entry.published,
                    selftext: truncate_chars(&entry.content, FEED_SELFTEXT_CHARS),
                },
            })
            .collect();

        Self {
            kind: "Listing",
            data: FeedListingData { children },
            source: "rss",
            collected_at,
        }
    }
}

/// Serialize `value` to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json<T>(value: &T, path: &Path) -> Result<PathBuf, Box<dyn Error>>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, &json).await?;
    info!(bytes = json.len(), "Wrote JSON file");
    Ok(path.to_path_buf())
}

/// Write feed entries as a listing-compatible document stamped with the
/// collection time.
pub async fn write_feed_listing(entries: &[FeedEntry], path: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let collected_at = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    write_json(&FeedListing::new(entries, collected_at), path).await
}
