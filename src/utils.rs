//! Utility functions for text cleanup, timestamps, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Character-safe truncation for excerpts and log previews
//! - Markdown cleanup for post bodies
//! - UTC date stamps and timestamp formatting
//! - File system validation for the output directory

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]\(.*?\)").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// First `max` characters of `s`, with `...` appended when anything was cut.
pub fn excerpt(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", truncate_chars(s, max))
    } else {
        s.to_string()
    }
}

/// Strip bold, italic, and inline-link markdown, keeping the inner text.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_markdown("**Big** [site](https://x.y)"), "Big site");
/// ```
pub fn clean_markdown(s: &str) -> String {
    let s = BOLD.replace_all(s, "$1");
    let s = ITALIC.replace_all(&s, "$1");
    LINK.replace_all(&s, "$1").into_owned()
}

/// Today's UTC date as `YYYY-MM-DD`, used in every output file name.
pub fn date_stamp() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Render a unix timestamp (seconds, possibly fractional) in UTC.
///
/// Out-of-range values render as the epoch.
pub fn format_timestamp(created_utc: f64, fmt: &str) -> String {
    let secs = if created_utc.is_finite() { created_utc.trunc() as i64 } else { 0 };
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format(fmt)
        .to_string()
}

/// A horizontal rule of `width` copies of `ch`.
pub fn rule(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn ensure_writable_dir(path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
    let path = path.as_ref();
    fs::create_dir_all(path).await?;

    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        // Must not split inside a code point
        let s = "éééé";
        assert_eq!(truncate_for_log(s, 2), "éé…(+4 bytes)");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
        assert_eq!(excerpt("日本語テキスト", 3), "日本語...");
    }

    #[test]
    fn test_clean_markdown() {
        assert_eq!(clean_markdown("**Bold** text"), "Bold text");
        assert_eq!(clean_markdown("an *italic* word"), "an italic word");
        assert_eq!(
            clean_markdown("see [the site](https://example.com) now"),
            "see the site now"
        );
        assert_eq!(clean_markdown("plain"), "plain");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1_700_000_000.0, "%Y-%m-%d %H:%M"),
            "2023-11-14 22:13"
        );
        assert_eq!(
            format_timestamp(1_700_000_000.9, "%Y-%m-%d %H:%M:%S"),
            "2023-11-14 22:13:20"
        );
        assert_eq!(format_timestamp(f64::NAN, "%Y-%m-%d"), "1970-01-01");
    }

    #[test]
    fn test_rule() {
        assert_eq!(rule('=', 3), "===");
        assert_eq!(rule('─', 2), "──");
    }

    #[test]
    fn test_date_stamp_shape() {
        let stamp = date_stamp();
        assert_eq!(stamp.len(), 10);
        assert_eq!(&stamp[4..5], "-");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
