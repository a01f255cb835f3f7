//! Feed for discovery, per-post JSON for stats.
//!
//! The feed supplies post ids without scores; each id is then looked up on
//! `/r/{sub}/comments/{id}.json`. Posts are fetched one at a time with a
//! politeness delay and a longer pause after every batch.

use super::{CollectError, Collection, first_usable_feed, subreddit_url};
use crate::config::{Config, Hosts, Pacing};
use crate::http::{FEED_UA, FetchError, get, plain_client};
use crate::models::{PostDetails, PostRef};
use crate::parsers::feed::post_refs;
use crate::parsers::listing::post_details;
use crate::retry::{FnFetch, RetryFetch};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const DETAIL_ATTEMPTS: usize = 2;

pub struct Hybrid {
    client: Client,
    hosts: Hosts,
    pacing: Pacing,
}

impl Hybrid {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(FEED_UA);
        Ok(Self {
            client: plain_client(
                user_agent,
                "application/json, text/html, */*",
                config.pacing.request_timeout(),
            )?,
            hosts: config.hosts.clone(),
            pacing: config.pacing.clone(),
        })
    }

    #[instrument(level = "info", skip(self))]
    pub async fn collect(&self, subreddit: &str) -> Result<Collection, CollectError> {
        let urls = [
            subreddit_url(&self.hosts.www, subreddit, ".rss"),
            subreddit_url(&self.hosts.old, subreddit, ".rss"),
        ];
        let entries = first_usable_feed(&self.client, &urls, &self.pacing, |entries| {
            !post_refs(entries).is_empty()
        })
        .await?;

        let refs = post_refs(&entries);
        info!(count = refs.len(), "Fetching details for posts");
        let posts = self.fetch_details(subreddit, &refs).await;
        Ok(Collection::Ranked(posts))
    }

    /// Look up every post in order; a failed lookup keeps a placeholder.
    pub async fn fetch_details(&self, subreddit: &str, refs: &[PostRef]) -> Vec<PostDetails> {
        let total = refs.len();
        let posts: Vec<PostDetails> = stream::iter(refs.iter().enumerate())
            .then(|(i, post)| async move {
                debug!(index = i + 1, total, id = %post.id, "Fetching post details");
                let details = match self.fetch_post(subreddit, post).await {
                    Ok(details) => details,
                    Err(e) => {
                        warn!(id = %post.id, error = %e, "Keeping placeholder for post");
                        PostDetails::unavailable(post)
                    }
                };

                if self.pacing.pause_due(i + 1) && i + 1 < total {
                    debug!(after = i + 1, "Pausing between batches");
                    sleep(self.pacing.batch_pause()).await;
                }
                details
            })
            .collect()
            .await;

        info!(count = posts.len(), "Fetched post details");
        posts
    }

    async fn fetch_post(&self, subreddit: &str, post: &PostRef) -> Result<PostDetails, FetchError> {
        let url = subreddit_url(&self.hosts.www, subreddit, &format!("/comments/{}.json", post.id));
        let url = &url;

        let fetch = FnFetch(|_attempt: usize| async move {
            sleep(self.pacing.post_delay()).await;
            let fetched = get(&self.client, url).await?.ensure_success()?;
            let value: Value = serde_json::from_str(&fetched.body)?;
            post_details(&value)
        });

        RetryFetch::paced(fetch, format!("post {}", post.id), DETAIL_ATTEMPTS, &self.pacing)
            .run()
            .await
    }
}
