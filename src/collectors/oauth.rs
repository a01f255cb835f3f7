//! Authenticated API access with an application-only token.
//!
//! The token comes from the client-credentials grant and is cached until five
//! minutes before it expires. A `401` from the listing endpoint drops the
//! cached token so the next attempt authenticates again.

use super::{CollectError, Collection, processed_posts, subreddit_url};
use crate::config::{Config, Hosts, Pacing};
use crate::http::{FetchError, OAUTH_DEFAULT_UA};
use crate::models::ListingFlavor;
use crate::parsers::listing::validate_listing;
use crate::retry::{FnFetch, RetryFetch};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const MAX_ATTEMPTS: usize = 3;

/// Tokens are refreshed this long before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Application credentials for the client-credentials grant.
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl Credentials {
    /// Both parts must be present and non-empty.
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        let client_id = client_id.filter(|id| !id.trim().is_empty())?;
        let client_secret = client_secret.filter(|s| !s.trim().is_empty())?;
        Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct AccessToken {
    value: SecretString,
    refresh_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

pub struct OAuthApi {
    client: Client,
    credentials: Credentials,
    hosts: Hosts,
    pacing: Pacing,
    limit: u32,
    token: Mutex<Option<AccessToken>>,
}

impl OAuthApi {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self, FetchError> {
        let user_agent = config.user_agent.as_deref().unwrap_or(OAUTH_DEFAULT_UA);
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(config.pacing.request_timeout())
            .build()?;

        Ok(Self {
            client,
            credentials,
            hosts: config.hosts.clone(),
            pacing: config.pacing.clone(),
            limit: config.limit,
            token: Mutex::new(None),
        })
    }

    #[instrument(level = "info", skip(self))]
    pub async fn collect(&self, subreddit: &str) -> Result<Collection, CollectError> {
        let raw = self.fetch_listing(subreddit).await?;
        let posts = processed_posts(&raw, ListingFlavor::OAuth);

        Ok(Collection::Listing {
            raw,
            posts,
            flavor: ListingFlavor::OAuth,
        })
    }

    /// GET the hot listing, authenticating as needed.
    pub async fn fetch_listing(&self, subreddit: &str) -> Result<Value, FetchError> {
        let url = subreddit_url(&self.hosts.oauth, subreddit, "/hot.json");
        let url = &url;

        let fetch = FnFetch(|attempt: usize| async move {
            info!(%url, attempt, max = MAX_ATTEMPTS, "Fetching listing");
            let token = self.bearer_token().await?;

            let response = self
                .client
                .get(url)
                .query(&[("limit", self.limit)])
                .bearer_auth(token.expose_secret())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                warn!("Token rejected; clearing cached token");
                self.invalidate_token().await;
                return Err(FetchError::Unauthorized);
            }
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let body = response.text().await?;
            let value: Value = serde_json::from_str(&body)?;
            validate_listing(&value)?;
            Ok::<_, FetchError>(value)
        });

        RetryFetch::paced(fetch, format!("r/{} api listing", subreddit), MAX_ATTEMPTS, &self.pacing)
            .run()
            .await
    }

    /// A valid token, requesting a new one when none is cached or it is stale.
    async fn bearer_token(&self) -> Result<SecretString, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(SecretString::from(token.value.expose_secret().to_string()));
        }

        let fresh = self.request_token().await?;
        let value = SecretString::from(fresh.value.expose_secret().to_string());
        *cached = Some(fresh);
        Ok(value)
    }

    #[instrument(level = "debug", skip(self))]
    async fn request_token(&self) -> Result<AccessToken, FetchError> {
        info!("Requesting access token");
        let response = self
            .client
            .post(&self.hosts.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;
        debug!(%content_type, bytes = body.len(), "Token response received");

        let token: TokenResponse = serde_json::from_str(&body)?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        info!(expires_in = token.expires_in, "Obtained access token");

        let now = Instant::now();
        let refresh_at = now.checked_add(lifetime).unwrap_or_else(|| {
            warn!(expires_in = token.expires_in, "Token lifetime out of range; treating it as stale");
            now
        });
        Ok(AccessToken {
            value: SecretString::from(token.access_token),
            refresh_at,
        })
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}
