//! Readable text renderings of listings and feeds.

use crate::models::{FeedEntry, ListingFlavor, ProcessedPost};
use crate::utils::{rule, truncate_chars};
use std::fmt::{self, Write};

const FEED_CONTENT_CHARS: usize = 500;

/// One block per post under a dated header.
///
/// The API flavor uses a wider rule, names its source, and shows the upvote
/// ratio and the outbound URL.
pub fn render_listing(
    posts: &[ProcessedPost],
    flavor: ListingFlavor,
    subreddit: &str,
    date: &str,
) -> Result<String, fmt::Error> {
    let width = match flavor {
        ListingFlavor::PublicJson => 60,
        ListingFlavor::OAuth => 70,
    };
    let line = rule('=', width);
    let mut out = String::new();

    writeln!(out, "Reddit r/{} - {}", subreddit, date)?;
    if flavor == ListingFlavor::OAuth {
        writeln!(out, "{}", line)?;
        writeln!(out, "Source: Reddit Official API (OAuth)")?;
        writeln!(out, "Posts: {}", posts.len())?;
    }
    writeln!(out, "{}\n", line)?;

    for post in posts {
        writeln!(out, "{}", line)?;
        writeln!(out, "POST #{}: {}", post.rank, post.title)?;
        writeln!(out, "{}", line)?;
        writeln!(out, "Author: u/{}", post.author)?;
        match (flavor, post.upvote_ratio) {
            (ListingFlavor::OAuth, Some(ratio)) => writeln!(
                out,
                "Score: {} | Comments: {} | Upvote Ratio: {:.1}%",
                post.score,
                post.num_comments,
                ratio * 100.0
            )?,
            _ => writeln!(out, "Score: {} | Comments: {}", post.score, post.num_comments)?,
        }
        match flavor {
            ListingFlavor::PublicJson => writeln!(out, "Posted: {}", post.posted_date)?,
            ListingFlavor::OAuth => writeln!(out, "Posted: {} UTC", post.posted_date)?,
        }
        writeln!(out, "Link: {}", post.permalink)?;
        if flavor == ListingFlavor::OAuth && post.url != post.permalink {
            writeln!(out, "URL: {}", post.url)?;
        }
        writeln!(out, "\nCONTENT:\n{}\n", post.content)?;
    }

    Ok(out)
}

pub fn render_feed(entries: &[FeedEntry], subreddit: &str, date: &str) -> Result<String, fmt::Error> {
    let line = rule('=', 60);
    let mut out = String::new();

    writeln!(out, "Reddit r/{} - {}", subreddit, date)?;
    writeln!(out, "{}", line)?;
    writeln!(out, "Source: RSS Feed")?;
    writeln!(out, "Entries: {}", entries.len())?;
    writeln!(out, "{}\n", line)?;

    for (i, entry) in entries.iter().enumerate() {
        let content = if entry.content.is_empty() {
            "N/A".to_string()
        } else {
            truncate_chars(&entry.content, FEED_CONTENT_CHARS)
        };

        writeln!(out, "{}", line)?;
        writeln!(out, "POST #{}: {}", i + 1, entry.title)?;
        writeln!(out, "{}", line)?;
        writeln!(out, "Author: u/{}", entry.author)?;
        writeln!(out, "Published: {}", entry.published)?;
        writeln!(out, "Link: {}", entry.link)?;
        writeln!(out, "\nCONTENT:\n{}\n", content)?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn post(flavor: ListingFlavor) -> ProcessedPost {
        ProcessedPost {
            rank: 1,
            title: "Menu bar timer".into(),
            author: "alice".into(),
            score: 42,
            num_comments: 7,
            created_utc: 1700000000.0,
            posted_date: "2023-11-14 22:13".into(),
            permalink: "https://reddit.com/r/macapps/comments/abc/menu/".into(),
            url: "https://example.com/timer".into(),
            content: "Small and fast.".into(),
            is_self: false,
            upvote_ratio: (flavor == ListingFlavor::OAuth).then_some(0.956),
            post_id: None,
        }
    }

    #[test]
    fn test_render_public_listing() {
        let text = render_listing(&[post(ListingFlavor::PublicJson)], ListingFlavor::PublicJson, "macapps", "2025-05-06")
            .unwrap();
        let line = "=".repeat(60);
        let expected = format!(
            "Reddit r/macapps - 2025-05-06\n{line}\n\n\
             {line}\nPOST #1: Menu bar timer\n{line}\n\
             Author: u/alice\n\
             Score: 42 | Comments: 7\n\
             Posted: 2023-11-14 22:13\n\
             Link: https://reddit.com/r/macapps/comments/abc/menu/\n\
             \nCONTENT:\nSmall and fast.\n\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_oauth_listing() {
        let text = render_listing(&[post(ListingFlavor::OAuth)], ListingFlavor::OAuth, "macapps", "2025-05-06")
            .unwrap();
        assert!(text.starts_with(&format!(
            "Reddit r/macapps - 2025-05-06\n{0}\nSource: Reddit Official API (OAuth)\nPosts: 1\n{0}\n\n",
            "=".repeat(70)
        )));
        assert!(text.contains("Score: 42 | Comments: 7 | Upvote Ratio: 95.6%\n"));
        assert!(text.contains("Posted: 2023-11-14 22:13 UTC\n"));
        assert!(text.contains("URL: https://example.com/timer\n"));
    }

    #[test]
    fn test_render_feed() {
        let entries = vec![FeedEntry {
            title: "Hello".into(),
            link: "https://www.reddit.com/r/macapps/comments/abc/hello/".into(),
            author: "bob".into(),
            published: "2025-05-06T10:00:00+00:00".into(),
            content: String::new(),
        }];
        let text = render_feed(&entries, "macapps", "2025-05-06").unwrap();

        assert!(text.contains("Source: RSS Feed\nEntries: 1\n"));
        assert!(text.contains("POST #1: Hello\n"));
        assert!(text.contains("Author: u/bob\nPublished: 2025-05-06T10:00:00+00:00\n"));
        assert!(text.ends_with("\nCONTENT:\nN/A\n\n"));
    }
}
