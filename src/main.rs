//! # Subreddit Collector
//!
//! Fetches the current posts of one or more subreddits and writes them to
//! date-stamped files, using one of five access strategies.
//!
//! ## Features
//!
//! - Public `.json` listing with browser-header spoofing (`json`)
//! - Feed discovery plus per-post JSON stats (`hybrid`, the default)
//! - Authenticated API with an application-only token (`oauth`)
//! - Feed only (`rss`)
//! - Feed discovery plus HTML page heuristics (`scrape`)
//!
//! ## Usage
//!
//! ```sh
//! subreddit_collector --strategy rss --subreddit macapps
//! ```
//!
//! ## Architecture
//!
//! The application runs a straight-line pipeline per subreddit:
//! 1. **Fetching**: retrying requests with ordered fallbacks
//! 2. **Parsing**: listing JSON, feeds, or HTML into flat records
//! 3. **Output**: raw and processed JSON plus readable text summaries
//!
//! Subreddits are processed one after another; a failure in one does not
//! stop the others, but makes the process exit non-zero.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod collectors;
mod config;
mod http;
mod models;
mod outputs;
mod parsers;
mod retry;
mod utils;

use cli::Cli;
use collectors::{Collector, Credentials};
use config::Config;
use http::FetchError;
use utils::{date_stamp, ensure_writable_dir};

#[tokio::main]
#[instrument]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("subreddit_collector starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(strategy = %args.strategy, config = %args.config, "Parsed CLI arguments");

    // ---- Load config ----
    let mut config = Config::load(&args.config);
    args.apply_to(&mut config);
    info!(
        strategy = %args.strategy,
        subreddits = ?config.subreddits,
        output_dir = %config.output_dir,
        "Configuration ready"
    );

    // Early check: ensure the output dir is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return ExitCode::FAILURE;
    }

    // ---- Build collector ----
    let credentials = Credentials::from_parts(args.client_id.clone(), args.client_secret.clone());
    let collector = match Collector::new(args.strategy, &config, credentials) {
        Ok(collector) => collector,
        Err(FetchError::MissingCredentials) => {
            error!("API credentials are required for the oauth strategy");
            error!("Set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET (or --client-id / --client-secret)");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "Failed to set up HTTP clients");
            return ExitCode::FAILURE;
        }
    };

    info!(strategy = %collector.strategy(), "Collector ready");

    // ---- Collect each subreddit ----
    let failed = collect_all(&collector, &config, &date_stamp()).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Collect every configured subreddit in order and return the ones that failed.
async fn collect_all(collector: &Collector, config: &Config, date: &str) -> Vec<String> {
    let total = config.subreddits.len();
    let mut failed: Vec<String> = Vec::new();

    for (i, subreddit) in config.subreddits.iter().enumerate() {
        info!(index = i + 1, total, %subreddit, "Processing subreddit");
        if !collect_one(collector, config, subreddit, date).await {
            failed.push(subreddit.clone());
        }
    }

    let successful = total - failed.len();
    info!("Collection complete: {}/{} successful", successful, total);
    if !failed.is_empty() {
        warn!(failed = ?failed, "Some subreddits failed");
    }
    failed
}

/// Collect and write one subreddit; `false` when either step failed.
#[instrument(level = "info", skip(collector, config, date))]
async fn collect_one(collector: &Collector, config: &Config, subreddit: &str, date: &str) -> bool {
    let collection = match collector.collect(subreddit).await {
        Ok(collection) => collection,
        Err(e) => {
            error!(%subreddit, error = %e, "Failed to collect subreddit");
            return false;
        }
    };

    if collection.is_empty() {
        warn!(%subreddit, "Collected no posts");
    }

    match outputs::write_collection(&collection, &config.output_dir, subreddit, date).await {
        Ok(paths) => {
            info!(%subreddit, files = paths.len(), posts = collection.len(), "Saved subreddit");
            true
        }
        Err(e) => {
            error!(%subreddit, error = %e, "Failed to save subreddit data");
            false
        }
    }
}
