//! Run configuration loaded from `config.yml`.
//!
//! Every key is optional. A missing or broken file is never fatal: the
//! collector logs a warning and runs with defaults, which collect `r/macapps`
//! into `./data`.
//!
//! ```yaml
//! subreddits:
//!   - macapps
//!   - rust
//! output_dir: data
//! limit: 25
//! pacing:
//!   retry_delay_ms: 5000
//!   batch_size: 5
//! ```

use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Subreddit collected when the configuration names none.
pub const DEFAULT_SUBREDDIT: &str = "macapps";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "skip_null_names")]
    pub subreddits: Vec<String>,
    pub output_dir: String,
    pub user_agent: Option<String>,
    /// Number of posts requested from the OAuth listing.
    pub limit: u32,
    pub hosts: Hosts,
    pub pacing: Pacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subreddits: vec![DEFAULT_SUBREDDIT.to_string()],
            output_dir: "data".to_string(),
            user_agent: None,
            limit: 25,
            hosts: Hosts::default(),
            pacing: Pacing::default(),
        }
    }
}

/// Base URLs for each host the strategies talk to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Hosts {
    pub www: String,
    pub old: String,
    pub bare: String,
    pub oauth: String,
    pub token_url: String,
}

impl Default for Hosts {
    fn default() -> Self {
        Self {
            www: "https://www.reddit.com".to_string(),
            old: "https://old.reddit.com".to_string(),
            bare: "https://reddit.com".to_string(),
            oauth: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
        }
    }
}

impl Hosts {
    /// Point every host at a single base URL.
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            www: base.to_string(),
            old: base.to_string(),
            bare: base.to_string(),
            oauth: base.to_string(),
            token_url: format!("{}/api/v1/access_token", base),
        }
    }
}

/// Politeness delays and retry timing, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub request_timeout_ms: u64,
    /// Wait before each feed or listing request.
    pub feed_delay_ms: u64,
    pub retry_delay_ms: u64,
    /// Added to the retry delay for every further attempt.
    pub retry_step_ms: u64,
    /// Wait before each per-post request.
    pub post_delay_ms: u64,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    /// Upper bound of the random jitter added to retry delays.
    pub jitter_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            feed_delay_ms: 2_000,
            retry_delay_ms: 5_000,
            retry_step_ms: 1_000,
            post_delay_ms: 2_000,
            batch_size: 5,
            batch_pause_ms: 3_000,
            jitter_ms: 250,
        }
    }
}

impl Pacing {
    /// No waiting at all; used by tests and dry runs against local mirrors.
    pub fn immediate() -> Self {
        Self {
            request_timeout_ms: 10_000,
            feed_delay_ms: 0,
            retry_delay_ms: 0,
            retry_step_ms: 0,
            post_delay_ms: 0,
            batch_size: 5,
            batch_pause_ms: 0,
            jitter_ms: 0,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn feed_delay(&self) -> Duration {
        Duration::from_millis(self.feed_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }

    pub fn post_delay(&self) -> Duration {
        Duration::from_millis(self.post_delay_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    /// Whether a pause is due after the `index`-th (1-based) post.
    pub fn pause_due(&self, index: usize) -> bool {
        self.batch_size > 0 && index % self.batch_size == 0
    }
}

impl Config {
    /// Load configuration from a YAML file, falling back to defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(default = DEFAULT_SUBREDDIT, "Config file not found; using defaults");
            return Self::default();
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Could not read config file; using defaults");
                return Self::default();
            }
        };

        match Self::from_yaml(&raw) {
            Ok(config) => {
                info!(subreddits = ?config.subreddits, "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(error = %e, "Error parsing config file; using defaults");
                Self::default()
            }
        }
    }

    /// Parse configuration from YAML text and normalize the subreddit list.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a map.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.subreddits = normalize_subreddits(config.subreddits);
        Ok(config)
    }
}

/// YAML lists written as `- ` with no value produce nulls; drop them.
fn skip_null_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(names.unwrap_or_default().into_iter().flatten().collect())
}

/// Trim names, drop blanks and a leading `r/`, and fall back to the default.
pub fn normalize_subreddits(subreddits: Vec<String>) -> Vec<String> {
    let cleaned: Vec<String> = subreddits
        .into_iter()
        .map(|s| {
            let s = s.trim();
            s.strip_prefix("r/").unwrap_or(s).to_string()
        })
        .filter(|s| !s.is_empty())
        .collect();

    if cleaned.is_empty() {
        warn!(default = DEFAULT_SUBREDDIT, "No subreddits configured; using default");
        vec![DEFAULT_SUBREDDIT.to_string()]
    } else {
        cleaned
    }
}
