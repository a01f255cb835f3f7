//! Public listing endpoint with browser-header spoofing.
//!
//! Each attempt walks three request approaches in order and keeps the first
//! `200 OK`:
//!
//! 1. Visit the subreddit page to pick up session cookies, then request the
//!    `.json` listing with XHR-style headers.
//! 2. Request the listing with fresh clients under rotating user agents.
//! 3. Request the listing from the old-style host.
//!
//! The body is then validated; HTML means the request was blocked.

use super::{CollectError, Collection, processed_posts, subreddit_url};
use crate::config::{Config, Hosts, Pacing};
use crate::http::{
    ALTERNATIVE_USER_AGENTS, DEFAULT_BROWSER_UA, FetchError, Fetched, MAX_REASONABLE_BYTES,
    MIN_LISTING_BYTES, browser_client, get, get_with, plain_client,
};
use crate::models::ListingFlavor;
use crate::parsers::listing::validate_listing;
use crate::retry::{FnFetch, RetryFetch};
use crate::utils::truncate_for_log;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const MAX_ATTEMPTS: usize = 3;

/// Desktop agent sent to the old-style host in the last approach.
const OLD_HOST_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone, Copy)]
enum Approach {
    Session,
    AlternativeAgents,
    OldHost,
}

pub struct JsonEndpoint {
    session: Client,
    hosts: Hosts,
    pacing: Pacing,
}

impl JsonEndpoint {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_BROWSER_UA);
        Ok(Self {
            session: browser_client(user_agent, config.pacing.request_timeout())?,
            hosts: config.hosts.clone(),
            pacing: config.pacing.clone(),
        })
    }

    #[instrument(level = "info", skip(self))]
    pub async fn collect(&self, subreddit: &str) -> Result<Collection, CollectError> {
        let raw = self.fetch_listing(subreddit).await?;
        let posts = processed_posts(&raw, ListingFlavor::PublicJson);

        Ok(Collection::Listing {
            raw,
            posts,
            flavor: ListingFlavor::PublicJson,
        })
    }

    /// Fetch and validate the raw listing, retrying whole attempts.
    pub async fn fetch_listing(&self, subreddit: &str) -> Result<Value, FetchError> {
        let page_url = subreddit_url(&self.hosts.www, subreddit, "");
        let json_url = subreddit_url(&self.hosts.www, subreddit, ".json");
        let old_url = subreddit_url(&self.hosts.old, subreddit, ".json");
        let (page_url, json_url, old_url) = (&page_url, &json_url, &old_url);

        let fetch = FnFetch(|attempt: usize| async move {
            if attempt == 1 {
                sleep(self.pacing.feed_delay()).await;
            }
            info!(%json_url, attempt, max = MAX_ATTEMPTS, "Fetching listing");
            let fetched = self.try_approaches(page_url, json_url, old_url).await?;
            validate_response(&fetched)
        });

        RetryFetch::paced(fetch, format!("r/{} listing", subreddit), MAX_ATTEMPTS, &self.pacing)
            .run()
            .await
    }

    async fn try_approaches(
        &self,
        page_url: &str,
        json_url: &str,
        old_url: &str,
    ) -> Result<Fetched, FetchError> {
        let approaches = [Approach::Session, Approach::AlternativeAgents, Approach::OldHost];

        for (i, approach) in approaches.into_iter().enumerate() {
            debug!(approach = i + 1, ?approach, "Trying approach");
            let outcome = match approach {
                Approach::Session => self.session_request(page_url, json_url).await,
                Approach::AlternativeAgents => self.alternative_agents(json_url).await,
                Approach::OldHost => self.old_host_request(old_url).await,
            };

            match outcome {
                Ok(Some(fetched)) if fetched.status == StatusCode::OK => {
                    info!(approach = i + 1, ?approach, "Approach succeeded");
                    return Ok(fetched);
                }
                Ok(Some(fetched)) => {
                    warn!(approach = i + 1, status = %fetched.status, "Approach got a non-200 response");
                }
                Ok(None) => {
                    warn!(approach = i + 1, "Approach got no usable response");
                }
                Err(e) => {
                    warn!(approach = i + 1, error = %e, "Approach failed");
                }
            }
        }

        Err(FetchError::AllApproachesFailed)
    }

    async fn session_request(&self, page_url: &str, json_url: &str) -> Result<Option<Fetched>, FetchError> {
        // Visiting the page first primes the cookie store.
        get(&self.session, page_url).await?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Ok(referer) = HeaderValue::from_str(page_url) {
            headers.insert(REFERER, referer);
        }

        get_with(&self.session, json_url, headers).await.map(Some)
    }

    async fn alternative_agents(&self, json_url: &str) -> Result<Option<Fetched>, FetchError> {
        for user_agent in ALTERNATIVE_USER_AGENTS {
            let client = plain_client(user_agent, "*/*", self.pacing.request_timeout())?;
            match get(&client, json_url).await {
                Ok(fetched) if fetched.status == StatusCode::OK => return Ok(Some(fetched)),
                Ok(fetched) => debug!(%user_agent, status = %fetched.status, "Alternative agent rejected"),
                Err(e) => debug!(%user_agent, error = %e, "Alternative agent failed"),
            }
        }
        Ok(None)
    }

    async fn old_host_request(&self, old_url: &str) -> Result<Option<Fetched>, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(OLD_HOST_UA));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/html, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        get_with(&self.session, old_url, headers).await.map(Some)
    }
}

/// Reject blocked, malformed, or implausibly small listings.
fn validate_response(fetched: &Fetched) -> Result<Value, FetchError> {
    if fetched.is_html() {
        warn!(
            content_type = %fetched.content_type,
            preview = %truncate_for_log(&fetched.body, 200),
            "Received HTML instead of JSON"
        );
        return Err(FetchError::Blocked);
    }

    let value: Value = serde_json::from_str(&fetched.body)?;
    validate_listing(&value)?;

    let bytes = fetched.body.len();
    if bytes < MIN_LISTING_BYTES {
        return Err(FetchError::TooSmall(bytes));
    }
    if bytes > MAX_REASONABLE_BYTES {
        warn!(bytes, "Listing is unusually large");
    }
    info!(bytes, "Listing validated");
    Ok(value)
}
