//! Feed for discovery, HTML pages for stats.
//!
//! Every feed link is fetched as a page and run through the heuristics in
//! [`crate::parsers::page`]. There is no retry per page; a page that cannot be
//! fetched is recorded as a `Failed to scrape` placeholder.

use super::{CollectError, Collection, first_usable_feed, subreddit_url};
use crate::config::{Config, Hosts, Pacing};
use crate::http::{FEED_UA, FetchError, get, plain_client};
use crate::models::{FeedEntry, PostDetails};
use crate::parsers::page::scrape_post_page;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

pub struct HtmlScraper {
    client: Client,
    hosts: Hosts,
    pacing: Pacing,
}

impl HtmlScraper {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(FEED_UA);
        Ok(Self {
            client: plain_client(user_agent, PAGE_ACCEPT, config.pacing.request_timeout())?,
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
            entries.iter().any(|e| !e.link.is_empty())
        })
        .await?;

        let links = self.post_links(&entries);
        info!(count = links.len(), "Scraping post pages");
        let posts = self.scrape_pages(&links).await;
        Ok(Collection::Ranked(posts))
    }

    /// Absolute links of every entry, resolved against the `www` host.
    pub fn post_links(&self, entries: &[FeedEntry]) -> Vec<String> {
        let base = Url::parse(&self.hosts.www).ok();
        entries
            .iter()
            .filter(|e| !e.link.is_empty())
            .filter_map(|e| match &base {
                Some(base) => base.join(&e.link).ok().map(String::from),
                None => Some(e.link.clone()),
            })
            .collect()
    }

    pub async fn scrape_pages(&self, links: &[String]) -> Vec<PostDetails> {
        let total = links.len();
        let posts: Vec<PostDetails> = stream::iter(links.iter().enumerate())
            .then(|(i, link)| async move {
                sleep(self.pacing.post_delay()).await;
                debug!(index = i + 1, total, %link, "Scraping post page");

                let details = match self.scrape_page(link).await {
                    Ok(details) => details,
                    Err(e) => {
                        warn!(%link, error = %e, "Failed to scrape post page");
                        PostDetails::scrape_failed(link)
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

        info!(count = posts.len(), "Scraped post pages");
        posts
    }

    async fn scrape_page(&self, link: &str) -> Result<PostDetails, FetchError> {
        let fetched = get(&self.client, link).await?.ensure_success()?;
        Ok(scrape_post_page(&fetched.body, link))
    }
}
