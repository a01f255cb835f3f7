//! Collection strategies, one per access method.
//!
//! Each strategy turns a subreddit name into a [`Collection`] through the same
//! straight-line pipeline: fetch with retries and ordered fallbacks, parse,
//! normalize. Fallbacks stop at the first success.
//!
//! # Strategies
//!
//! | Strategy | Module | Post list | Per-post stats |
//! |----------|--------|-----------|----------------|
//! | `json`   | [`json`] | `/r/{sub}.json` with browser headers | same listing |
//! | `hybrid` | [`hybrid`] | RSS/Atom feed | `/comments/{id}.json` per post |
//! | `oauth`  | [`oauth`] | API `/r/{sub}/hot.json` | same listing |
//! | `rss`    | [`rss`] | RSS/Atom feed | none |
//! | `scrape` | [`html`] | RSS/Atom feed | HTML page heuristics |

pub mod hybrid;
pub mod html;
pub mod json;
pub mod oauth;
pub mod rss;

use crate::config::{Config, Pacing};
use crate::http::{FetchError, get};
use crate::models::{FeedEntry, ListingFlavor, PostDetails, ProcessedPost};
use crate::parsers::feed::parse_feed;
use crate::parsers::listing::{parse_listing, process_posts};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

pub use oauth::Credentials;

/// Access method used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Public listing JSON with browser-header spoofing.
    Json,
    /// Feed for the post list, per-post JSON for stats.
    Hybrid,
    /// Authenticated API with an application-only token.
    Oauth,
    /// Feed only.
    Rss,
    /// Feed for the post list, HTML pages for stats.
    Scrape,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Json => "json",
            Strategy::Hybrid => "hybrid",
            Strategy::Oauth => "oauth",
            Strategy::Rss => "rss",
            Strategy::Scrape => "scrape",
        };
        f.write_str(name)
    }
}

/// What a strategy produced for one subreddit; decides which files are written.
#[derive(Debug)]
pub enum Collection {
    /// A listing kept verbatim alongside its ranked, flattened posts.
    ///
    /// `posts` is `None` when the listing validated but a post could not be
    /// decoded; only the raw listing is written then.
    Listing {
        raw: Value,
        posts: Option<Vec<ProcessedPost>>,
        flavor: ListingFlavor,
    },
    /// Feed entries without stats.
    Feed(Vec<FeedEntry>),
    /// Posts with stats, to be ranked by score.
    Ranked(Vec<PostDetails>),
}

impl Collection {
    pub fn len(&self) -> usize {
        match self {
            Collection::Listing { raw, .. } => raw
                .pointer("/data/children")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            Collection::Feed(entries) => entries.len(),
            Collection::Ranked(posts) => posts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flatten a validated listing, or log and give up on the processed view.
pub(crate) fn processed_posts(raw: &Value, flavor: ListingFlavor) -> Option<Vec<ProcessedPost>> {
    match parse_listing(raw) {
        Ok(listing) => {
            let posts = process_posts(&listing, flavor);
            info!(count = posts.len(), "Processed posts");
            Some(posts)
        }
        Err(e) => {
            error!(error = %e, "Failed to process posts; keeping the raw listing only");
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Every candidate endpoint was tried without a usable answer.
    #[error("all {tried} sources failed")]
    AllSourcesFailed { tried: usize },
}

enum Backend {
    Json(json::JsonEndpoint),
    Hybrid(hybrid::Hybrid),
    OAuth(oauth::OAuthApi),
    Rss(rss::RssFeed),
    Scrape(html::HtmlScraper),
}

/// Runs the selected strategy against one subreddit at a time.
pub struct Collector {
    strategy: Strategy,
    backend: Backend,
}

impl Collector {
    /// Build the HTTP clients for `strategy`.
    ///
    /// # Errors
    ///
    /// [`FetchError::MissingCredentials`] for the OAuth strategy without
    /// credentials; [`FetchError::Network`] if a client cannot be built.
    pub fn new(
        strategy: Strategy,
        config: &Config,
        credentials: Option<Credentials>,
    ) -> Result<Self, FetchError> {
        let backend = match strategy {
            Strategy::Json => Backend::Json(json::JsonEndpoint::new(config)?),
            Strategy::Hybrid => Backend::Hybrid(hybrid::Hybrid::new(config)?),
            Strategy::Oauth => {
                let credentials = credentials.ok_or(FetchError::MissingCredentials)?;
                Backend::OAuth(oauth::OAuthApi::new(config, credentials)?)
            }
            Strategy::Rss => Backend::Rss(rss::RssFeed::new(config)?),
            Strategy::Scrape => Backend::Scrape(html::HtmlScraper::new(config)?),
        };
        Ok(Self { strategy, backend })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[instrument(level = "info", skip(self), fields(strategy = %self.strategy))]
    pub async fn collect(&self, subreddit: &str) -> Result<Collection, CollectError> {
        info!("Starting collection");
        let collection = match &self.backend {
            Backend::Json(b) => b.collect(subreddit).await?,
            Backend::Hybrid(b) => b.collect(subreddit).await?,
            Backend::OAuth(b) => b.collect(subreddit).await?,
            Backend::Rss(b) => b.collect(subreddit).await?,
            Backend::Scrape(b) => b.collect(subreddit).await?,
        };
        info!(count = collection.len(), "Collection finished");
        Ok(collection)
    }
}

/// `{base}/r/{subreddit}{suffix}` with the name percent-encoded.
pub(crate) fn subreddit_url(base: &str, subreddit: &str, suffix: &str) -> String {
    format!(
        "{}/r/{}{}",
        base.trim_end_matches('/'),
        urlencoding::encode(subreddit),
        suffix
    )
}

/// GET a feed, require a 2xx status, and parse it.
pub(crate) async fn fetch_feed(client: &Client, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
    let fetched = get(client, url).await?.ensure_success()?;
    parse_feed(&fetched.body)
}

/// Try each feed URL in order and return the first feed `usable` accepts.
#[instrument(level = "info", skip_all)]
pub(crate) async fn first_usable_feed<F>(
    client: &Client,
    urls: &[String],
    pacing: &Pacing,
    usable: F,
) -> Result<Vec<FeedEntry>, CollectError>
where
    F: Fn(&[FeedEntry]) -> bool,
{
    for url in urls {
        info!(%url, "Fetching feed");
        sleep(pacing.feed_delay()).await;

        match fetch_feed(client, url).await {
            Ok(entries) if usable(&entries) => {
                info!(%url, count = entries.len(), "Found posts in feed");
                return Ok(entries);
            }
            Ok(entries) => {
                warn!(%url, count = entries.len(), "Feed has no usable posts");
            }
            Err(e) => {
                warn!(%url, error = %e, "Failed to fetch feed");
            }
        }
    }

    error!(tried = urls.len(), "Failed to fetch feed from all sources");
    Err(CollectError::AllSourcesFailed { tried: urls.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Hosts;

    #[test]
    fn test_subreddit_url() {
        assert_eq!(
            subreddit_url("https://www.reddit.com/", "macapps", ".json"),
            "https://www.reddit.com/r/macapps.json"
        );
        assert_eq!(
            subreddit_url("https://old.reddit.com", "odd name", ".rss"),
            "https://old.reddit.com/r/odd%20name.rss"
        );
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::Oauth.to_string(), "oauth");
        assert_eq!(Strategy::Scrape.to_string(), "scrape");
    }

    #[test]
    fn test_oauth_requires_credentials() {
        let config = Config {
            hosts: Hosts::single("http://127.0.0.1:9"),
            ..Config::default()
        };
        match Collector::new(Strategy::Oauth, &config, None) {
            Err(FetchError::MissingCredentials) => {}
            Err(e) => panic!("Expected MissingCredentials, got {:?}", e),
            Ok(_) => panic!("Expected MissingCredentials, got a collector"),
        }
    }

    #[test]
    fn test_collection_len() {
        assert!(Collection::Feed(Vec::new()).is_empty());
        assert_eq!(Collection::Ranked(vec![PostDetails::default()]).len(), 1);
    }
}
