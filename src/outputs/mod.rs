//! File writers for collected subreddits.
//!
//! Every file for a subreddit lands in its own directory and carries the UTC
//! date stamp of the run:
//!
//! ```text
//! output_dir/
//! └── macapps/
//!     ├── macapps_2025-05-06.json            # raw listing, feed wrapper, or ranked posts
//!     ├── macapps_2025-05-06_processed.json  # listing strategies
//!     ├── macapps_2025-05-06_readable.txt    # listing and feed strategies
//!     ├── macapps_2025-05-06_SUMMARY.txt     # ranked strategies
//!     └── macapps_2025-05-06_TOP10.txt       # ranked strategies
//! ```
//!
//! The primary `.json` file decides whether a subreddit counts as collected.
//! The secondary files are best effort: a failure is logged and skipped.
//!
//! # Submodules
//!
//! - [`json`]: pretty-printed JSON documents
//! - [`text`]: readable listings and feeds
//! - [`ranked`]: popularity-sorted summaries

pub mod json;
pub mod ranked;
pub mod text;

use crate::collectors::Collection;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// `{output_dir}/{sub}/{sub}_{date}` plus a per-file suffix.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    dir: PathBuf,
    stem: String,
}

impl OutputPaths {
    pub fn new(output_dir: impl AsRef<Path>, subreddit: &str, date: &str) -> Self {
        Self {
            dir: output_dir.as_ref().join(subreddit),
            stem: format!("{}_{}", subreddit, date),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, suffix))
    }
}

/// Write every file for one collected subreddit and return the paths written.
///
/// # Errors
///
/// Fails when the subreddit directory cannot be created or the primary JSON
/// file cannot be written.
#[instrument(level = "info", skip_all, fields(%subreddit, %date, output_dir = %output_dir.as_ref().display()))]
pub async fn write_collection(
    collection: &Collection,
    output_dir: impl AsRef<Path>,
    subreddit: &str,
    date: &str,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let paths = OutputPaths::new(output_dir, subreddit, date);
    if let Err(e) = fs::create_dir_all(paths.dir()).await {
        error!(dir = %paths.dir().display(), error = %e, "Failed to create subreddit directory");
        return Err(e.into());
    }

    let mut written = Vec::new();
    match collection {
        Collection::Listing { raw, posts, flavor } => {
            written.push(json::write_json(raw, &paths.file(".json")).await?);

            if let Some(posts) = posts {
                let processed = json::write_json(posts, &paths.file("_processed.json")).await;
                keep(&mut written, processed);
                let readable = match text::render_listing(posts, *flavor, subreddit, date) {
                    Ok(body) => write_text(&paths.file("_readable.txt"), &body).await,
                    Err(e) => Err(e.into()),
                };
                keep(&mut written, readable);
            } else {
                warn!("No processed posts; skipping processed and readable files");
            }
        }
        Collection::Feed(entries) => {
            written.push(json::write_feed_listing(entries, &paths.file(".json")).await?);

            let readable = match text::render_feed(entries, subreddit, date) {
                Ok(body) => write_text(&paths.file("_readable.txt"), &body).await,
                Err(e) => Err(e.into()),
            };
            keep(&mut written, readable);
        }
        Collection::Ranked(posts) => {
            let sorted = ranked::sort_by_score(posts);
            written.push(json::write_json(&sorted, &paths.file(".json")).await?);

            let summary = match ranked::render_summary(&sorted, subreddit, date) {
                Ok(body) => write_text(&paths.file("_SUMMARY.txt"), &body).await,
                Err(e) => Err(e.into()),
            };
            keep(&mut written, summary);
            let top10 = match ranked::render_top10(&sorted, subreddit, date) {
                Ok(body) => write_text(&paths.file("_TOP10.txt"), &body).await,
                Err(e) => Err(e.into()),
            };
            keep(&mut written, top10);
        }
    }

    info!(files = written.len(), "Wrote subreddit outputs");
    Ok(written)
}

/// Record a secondary file, or log why it is missing.
fn keep(written: &mut Vec<PathBuf>, result: Result<PathBuf, Box<dyn Error>>) {
    match result {
        Ok(path) => written.push(path),
        Err(e) => error!(error = %e, "Failed to write secondary output"),
    }
}

pub(crate) async fn write_text(path: &Path, body: &str) -> Result<PathBuf, Box<dyn Error>> {
    fs::write(path, body).await?;
    info!(path = %path.display(), bytes = body.len(), "Wrote text file");
    Ok(path.to_path_buf())
}
