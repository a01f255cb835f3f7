//! Popularity-ranked summaries for the hybrid and scrape strategies.

use crate::models::PostDetails;
use crate::utils::{rule, truncate_chars};
use std::fmt::{self, Write};

const SUMMARY_EXCERPT_CHARS: usize = 200;
const TOP10_TITLE_CHARS: usize = 60;

/// Posts ordered by score, highest first; ties keep collection order.
pub fn sort_by_score(posts: &[PostDetails]) -> Vec<PostDetails> {
    let mut sorted = posts.to_vec();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));
    sorted
}

/// Every post with its stats line, title, link, and a short excerpt.
pub fn render_summary(sorted: &[PostDetails], subreddit: &str, date: &str) -> Result<String, fmt::Error> {
    let heavy = rule('=', 80);
    let light = rule('─', 80);
    let mut out = String::new();

    writeln!(out, "r/{} - {}", subreddit, date)?;
    writeln!(out, "{}", heavy)?;
    writeln!(out, "SORTED BY POPULARITY (Most upvoted first)")?;
    writeln!(out, "Total posts: {}", sorted.len())?;
    writeln!(out, "{}\n", heavy)?;

    for (i, post) in sorted.iter().enumerate() {
        writeln!(out, "\n{}", light)?;
        writeln!(
            out,
            "#{} | ⬆ {:4} upvotes | 💬 {:3} comments | 👤 u/{}",
            i + 1,
            post.score,
            post.num_comments,
            post.author_or_unknown()
        )?;
        writeln!(out, "{}", light)?;
        writeln!(out, "{}", post.title)?;
        writeln!(out, "🔗 {}", post.permalink)?;

        if let Some(selftext) = post.selftext.as_deref().filter(|s| !s.is_empty()) {
            writeln!(out, "\n{}...", truncate_chars(selftext, SUMMARY_EXCERPT_CHARS))?;
        }
    }

    Ok(out)
}

/// The ten highest-scoring posts, one line each plus the link.
pub fn render_top10(sorted: &[PostDetails], subreddit: &str, date: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out, "r/{} - TOP 10 MOST POPULAR - {}", subreddit, date)?;
    writeln!(out, "{}\n", rule('=', 80))?;

    for (i, post) in sorted.iter().take(10).enumerate() {
        writeln!(
            out,
            "{:2}. ⬆{:4} 💬{:3} | {}",
            i + 1,
            post.score,
            post.num_comments,
            truncate_chars(&post.title, TOP10_TITLE_CHARS)
        )?;
        writeln!(out, "    {}\n", post.permalink)?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn post(title: &str, score: i64, comments: i64) -> PostDetails {
        PostDetails {
            title: title.into(),
            author: Some("alice".into()),
            score,
            num_comments: comments,
            permalink: format!("https://reddit.com/r/macapps/comments/{}/", title),
            selftext: Some(String::new()),
            ..PostDetails::default()
        }
    }

    #[test]
    fn test_sort_is_stable_and_descending() {
        let posts = vec![post("a", 5, 0), post("b", 20, 0), post("c", 5, 0), post("d", 1, 0)];
        let titles: Vec<_> = sort_by_score(&posts).into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_render_summary() {
        let mut with_text = post("first", 120, 8);
        with_text.selftext = Some("Body text".into());
        let placeholder = PostDetails {
            title: "Details unavailable".into(),
            permalink: "https://www.reddit.com/r/macapps/comments/zz/".into(),
            ..PostDetails::default()
        };

        let text = render_summary(&[with_text, placeholder], "macapps", "2025-05-06").unwrap();
        let heavy = "=".repeat(80);
        let light = "─".repeat(80);
        let expected = format!(
            "r/macapps - 2025-05-06\n{heavy}\nSORTED BY POPULARITY (Most upvoted first)\nTotal posts: 2\n{heavy}\n\n\
             \n{light}\n#1 | ⬆  120 upvotes | 💬   8 comments | 👤 u/alice\n{light}\n\
             first\n🔗 https://reddit.com/r/macapps/comments/first/\n\nBody text...\n\
             \n{light}\n#2 | ⬆    0 upvotes | 💬   0 comments | 👤 u/unknown\n{light}\n\
             Details unavailable\n🔗 https://www.reddit.com/r/macapps/comments/zz/\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_top10_limits_and_truncates() {
        let long_title = "t".repeat(80);
        let mut posts: Vec<PostDetails> = (0..12).map(|i| post(&format!("p{}", i), 100 - i, i)).collect();
        posts[0].title = long_title;

        let text = render_top10(&posts, "macapps", "2025-05-06").unwrap();
        assert!(text.starts_with("r/macapps - TOP 10 MOST POPULAR - 2025-05-06\n"));
        assert_eq!(text.matches("⬆").count(), 10);
        assert!(text.contains(&format!(" 1. ⬆ 100 💬  0 | {}\n", "t".repeat(60))));
        assert!(text.contains("10. ⬆  91 💬  9 | p9\n    https://reddit.com/r/macapps/comments/p9/\n\n"));
        assert!(!text.contains("p10"));
    }
}
