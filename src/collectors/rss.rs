//! Feed-only collection.
//!
//! Three feed URLs are tried in order (old-style host, `www`, bare domain),
//! each with its own retry budget. A URL whose response is not a feed, does
//! not parse, or holds no entries hands over to the next one.

use super::{CollectError, Collection, subreddit_url};
use crate::config::{Config, Hosts, Pacing};
use crate::http::{FEED_UA, FetchError, get, plain_client};
use crate::models::FeedEntry;
use crate::parsers::feed::{looks_like_feed, parse_feed};
use crate::retry::{FnFetch, RetryFetch};
use reqwest::Client;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const MAX_ATTEMPTS: usize = 3;

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";

pub struct RssFeed {
    client: Client,
    hosts: Hosts,
    pacing: Pacing,
}

impl RssFeed {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(FEED_UA);
        Ok(Self {
            client: plain_client(user_agent, FEED_ACCEPT, config.pacing.request_timeout())?,
            hosts: config.hosts.clone(),
            pacing: config.pacing.clone(),
        })
    }

    /// Candidate feed URLs, most lenient host first.
    pub fn feed_urls(&self, subreddit: &str) -> Vec<String> {
        [&self.hosts.old, &self.hosts.www, &self.hosts.bare]
            .into_iter()
            .map(|base| subreddit_url(base, subreddit, ".rss"))
            .collect()
    }

    #[instrument(level = "info", skip(self))]
    pub async fn collect(&self, subreddit: &str) -> Result<Collection, CollectError> {
        let urls = self.feed_urls(subreddit);

        for url in &urls {
            match self.fetch_from(url).await {
                Ok(entries) => {
                    info!(%url, count = entries.len(), "Parsed feed entries");
                    return Ok(Collection::Feed(entries));
                }
                Err(e) => warn!(%url, error = %e, "Feed source failed; trying next"),
            }
        }

        error!(tried = urls.len(), "All feed sources failed");
        Err(CollectError::AllSourcesFailed { tried: urls.len() })
    }

    async fn fetch_from(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        let fetch = FnFetch(|attempt: usize| async move {
            if attempt == 1 {
                sleep(self.pacing.feed_delay()).await;
            }
            info!(%url, attempt, max = MAX_ATTEMPTS, "Fetching feed");

            let fetched = get(&self.client, url).await?.ensure_success()?;
            if !looks_like_feed(&fetched.content_type) {
                return Err(FetchError::UnexpectedContentType(fetched.content_type));
            }

            let entries = parse_feed(&fetched.body)?;
            if entries.is_empty() {
                return Err(FetchError::NoEntries);
            }
            Ok::<_, FetchError>(entries)
        });

        RetryFetch::paced(fetch, url, MAX_ATTEMPTS, &self.pacing).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>macapps</title>
  <entry>
    <author><name>/u/alice</name><uri>https://www.reddit.com/user/alice</uri></author>
    <content type="html">&lt;p&gt;Hello&lt;/p&gt;</content>
    <id>t3_abc123</id>
    <link href="https://www.reddit.com/r/macapps/comments/abc123/hello/" />
    <updated>2024-01-02T03:04:05+00:00</updated>
    <title>Hello world</title>
  </entry>
</feed>"#;

    fn feed_with_hosts(hosts: Hosts) -> RssFeed {
        let config = Config {
            hosts,
            pacing: Pacing::immediate(),
            ..Config::default()
        };
        RssFeed::new(&config).unwrap()
    }

    #[test]
    fn test_feed_url_order() {
        let feed = feed_with_hosts(Hosts::default());
        assert_eq!(
            feed.feed_urls("macapps"),
            vec![
                "https://old.reddit.com/r/macapps.rss",
                "https://www.reddit.com/r/macapps.rss",
                "https://reddit.com/r/macapps.rss",
            ]
        );
    }

    #[tokio::test]
    async fn test_collects_atom_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/macapps.rss"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(ATOM, "application/atom+xml; charset=UTF-8"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let feed = feed_with_hosts(Hosts::single(&mock_server.uri()));
        match feed.collect("macapps").await.unwrap() {
            Collection::Feed(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].title, "Hello world");
                assert_eq!(entries[0].author, "alice");
                assert_eq!(entries[0].content, "<p>Hello</p>");
            }
            other => panic!("Expected a feed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_html_content_type_moves_to_next_source() {
        let old = MockServer::start().await;
        let www = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>login</html>", "text/html"),
            )
            .expect(MAX_ATTEMPTS as u64)
            .mount(&old)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(ATOM, "text/xml"),
            )
            .expect(1)
            .mount(&www)
            .await;

        let hosts = Hosts {
            old: old.uri(),
            www: www.uri(),
            ..Hosts::single(&www.uri())
        };
        let feed = feed_with_hosts(hosts);
        let collection = feed.collect("macapps").await.unwrap();
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_feed_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#, "application/atom+xml"),
            )
            .mount(&mock_server)
            .await;

        let feed = feed_with_hosts(Hosts::single(&mock_server.uri()));
        let result = feed.collect("macapps").await;
        assert!(matches!(result, Err(CollectError::AllSourcesFailed { tried: 3 })));
        // One request per source.
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    }
}
