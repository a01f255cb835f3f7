//! HTTP plumbing shared by every collection strategy.
//!
//! This module owns the [`FetchError`] taxonomy, the browser-like and plain
//! `reqwest` clients, and a small [`get`] helper that captures the status,
//! content type, and body of a response in one [`Fetched`] value.
//!
//! # Error Classification
//!
//! Errors are split into two families. Transport problems (connection
//! failures, timeouts, non-2xx statuses) are *retryable*: the attempt loop in
//! [`crate::retry`] backs off and tries again. Payload problems (HTML where
//! JSON was expected, malformed JSON or XML, empty feeds) are *fatal* for the
//! current endpoint and stop the loop immediately.

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, DNT, HeaderMap, HeaderName, HeaderValue,
    UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Default desktop user agent used when `REDDIT_USER_AGENT` is not set.
pub const DEFAULT_BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// User agent used by the feed based strategies.
pub const FEED_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// User agent sent to the OAuth API when none is configured.
pub const OAUTH_DEFAULT_UA: &str = "github:reddit-cron:v1.0 (by /u/YOUR_USERNAME)";

/// Rotation list for the "alternative user agent" approach.
pub const ALTERNATIVE_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/121.0",
];

/// Responses larger than this are accepted but logged as suspicious.
pub const MAX_REASONABLE_BYTES: usize = 50 * 1024 * 1024;

/// A listing body smaller than this is an error page, not data.
pub const MIN_LISTING_BYTES: usize = 100;

/// Errors raised while fetching and validating remote content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connect, TLS, timeout, body read).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response with a non-2xx status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The server answered with an HTML page where JSON was requested.
    #[error("server returned HTML instead of JSON, request is likely blocked")]
    Blocked,
    /// Body could not be decoded as JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Body could not be parsed as XML.
    #[error("invalid XML: {0}")]
    Xml(String),
    /// JSON or XML parsed but does not have the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("response too small ({0} bytes), likely empty or an error page")]
    TooSmall(usize),
    #[error("no entries found in feed")]
    NoEntries,
    /// A feed URL answered with something that is not XML.
    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),
    /// The API rejected the bearer token.
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing API credentials (set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET)")]
    MissingCredentials,
    /// Every request approach of an attempt came back without a 200.
    #[error("all approaches failed")]
    AllApproachesFailed,
}

impl FetchError {
    /// Whether another attempt against the same endpoint could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_)
                | FetchError::HttpStatus(_)
                | FetchError::Unauthorized
                | FetchError::UnexpectedContentType(_)
                | FetchError::AllApproachesFailed
        )
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    /// Value of the `Content-Type` header, empty when absent.
    pub content_type: String,
    pub body: String,
}

impl Fetched {
    /// Map a non-2xx status to [`FetchError::HttpStatus`].
    pub fn ensure_success(self) -> Result<Self, FetchError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(FetchError::HttpStatus(self.status.as_u16()))
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().starts_with("text/html")
    }
}

/// Build a client that presents itself as a desktop browser.
///
/// The client keeps a cookie store so that visiting a listing page first
/// carries its session cookies into the follow-up JSON request.
pub fn browser_client(user_agent: &str, timeout: Duration) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    let client = Client::builder()
        .user_agent(user_agent.to_string())
        .default_headers(headers)
        .cookie_store(true)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Build a client with only a user agent and an `Accept` header.
pub fn plain_client(
    user_agent: &str,
    accept: &'static str,
    timeout: Duration,
) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let client = Client::builder()
        .user_agent(user_agent.to_string())
        .default_headers(headers)
        .cookie_store(true)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// GET `url` and read the whole body.
pub async fn get(client: &Client, url: &str) -> Result<Fetched, FetchError> {
    get_with(client, url, HeaderMap::new()).await
}

/// GET `url` with extra per-request headers and read the whole body.
#[instrument(level = "debug", skip(client, headers))]
pub async fn get_with(client: &Client, url: &str, headers: HeaderMap) -> Result<Fetched, FetchError> {
    let response = client.get(url).headers(headers).send().await?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.text().await?;
    debug!(%status, %content_type, bytes = body.len(), "Received response");

    Ok(Fetched {
        status,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::HttpStatus(503).is_retryable());
        assert!(FetchError::HttpStatus(403).is_retryable());
        assert!(FetchError::AllApproachesFailed.is_retryable());
        assert!(FetchError::Unauthorized.is_retryable());
        assert!(FetchError::UnexpectedContentType("text/html".into()).is_retryable());
        assert!(!FetchError::Blocked.is_retryable());
        assert!(!FetchError::NoEntries.is_retryable());
        assert!(!FetchError::TooSmall(12).is_retryable());
        assert!(!FetchError::InvalidPayload("x".into()).is_retryable());
    }

    #[test]
    fn test_ensure_success() {
        let ok = Fetched {
            status: StatusCode::OK,
            content_type: "application/json".into(),
            body: "{}".into(),
        };
        assert!(ok.ensure_success().is_ok());

        let not_found = Fetched {
            status: StatusCode::NOT_FOUND,
            content_type: String::new(),
            body: String::new(),
        };
        match not_found.ensure_success() {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[test]
    fn test_is_html() {
        let page = Fetched {
            status: StatusCode::OK,
            content_type: "Text/HTML; charset=utf-8".into(),
            body: String::new(),
        };
        assert!(page.is_html());
    }

    #[tokio::test]
    async fn test_browser_client_sends_spoofed_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/macapps"))
            .and(header("dnt", "1"))
            .and(header("sec-fetch-mode", "navigate"))
            .and(header_regex("user-agent", r"X11; Linux x86_64.*Chrome/120"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = browser_client(DEFAULT_BROWSER_UA, Duration::from_secs(5)).unwrap();
        let fetched = get(&client, &format!("{}/r/macapps", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(fetched.status, StatusCode::OK);
        assert!(fetched.is_html());
        assert_eq!(fetched.body, "<html></html>");
    }
}
