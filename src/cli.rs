//! Command-line interface definitions for the subreddit collector.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Flags override the matching `config.yml` keys; credentials and the user
//! agent can also come from environment variables.

use crate::collectors::Strategy;
use crate::config::Config;
use clap::Parser;

/// Command-line arguments for the subreddit collector.
///
/// # Examples
///
/// ```sh
/// # Feed plus per-post JSON, subreddits from config.yml
/// subreddit_collector
///
/// # Feed only, two subreddits, custom output directory
/// subreddit_collector -s rss -r macapps -r rust -o ./out
///
/// # Authenticated API
/// REDDIT_CLIENT_ID=... REDDIT_CLIENT_SECRET=... subreddit_collector -s oauth
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// How posts are fetched
    #[arg(short, long, value_enum, default_value_t = Strategy::Hybrid)]
    pub strategy: Strategy,

    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: String,

    /// Output directory (overrides `output_dir` from the config file)
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Subreddit to collect; repeat for several (overrides `subreddits`)
    #[arg(short = 'r', long = "subreddit")]
    pub subreddits: Vec<String>,

    /// Number of posts requested from the API listing
    #[arg(long)]
    pub limit: Option<u32>,

    /// User agent sent with every request
    #[arg(long, env = "REDDIT_USER_AGENT")]
    pub user_agent: Option<String>,

    /// API application id
    #[arg(long, env = "REDDIT_CLIENT_ID")]
    pub client_id: Option<String>,

    /// API application secret
    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if !self.subreddits.is_empty() {
            config.subreddits = crate::config::normalize_subreddits(self.subreddits.clone());
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(user_agent) = self.user_agent.as_ref().filter(|ua| !ua.trim().is_empty()) {
            config.user_agent = Some(user_agent.clone());
        }
    }
}
