//! RSS 2.0 and Atom feed parsing.
//!
//! The feed is read with `quick-xml` into a small element tree with namespace
//! prefixes dropped, which is then queried much like an ElementTree: first
//! every `item` anywhere in the document (RSS 2.0 and RSS 1.0), otherwise
//! every `entry` (Atom).
//!
//! Entity references arrive as separate reader events and are resolved here;
//! only the five predefined XML entities and numeric character references are
//! expanded; anything else is kept verbatim.

use crate::http::FetchError;
use crate::models::{FeedEntry, PostRef};
use itertools::Itertools;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

static POST_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/comments/([a-z0-9]+)/").unwrap());

#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn first_child<'a>(&'a self, names: &[&str]) -> Option<&'a Node> {
        names.iter().find_map(|name| self.child(name))
    }

    fn descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a Node>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.descendants(name, out);
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> &str {
        self.text.trim()
    }
}

/// Parse an RSS or Atom document into flat entries.
///
/// # Errors
///
/// [`FetchError::Xml`] when the document is not well-formed or has no root
/// element. An empty but valid feed yields an empty vector.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, FetchError> {
    let root = parse_tree(xml)?;

    let mut items = Vec::new();
    root.descendants("item", &mut items);
    if items.is_empty() {
        root.descendants("entry", &mut items);
    }

    Ok(items.into_iter().map(entry_from_node).collect())
}

/// Post id from a permalink such as `/r/sub/comments/abc123/title/`.
pub fn post_ref(link: &str) -> Option<PostRef> {
    POST_ID.captures(link).map(|caps| PostRef {
        id: caps[1].to_string(),
        link: link.to_string(),
    })
}

/// Post references for every entry linking to a post, first occurrence wins.
pub fn post_refs(entries: &[FeedEntry]) -> Vec<PostRef> {
    entries
        .iter()
        .filter_map(|e| post_ref(&e.link))
        .unique_by(|r| r.id.clone())
        .collect()
}

/// Whether a `Content-Type` header names an XML feed.
pub fn looks_like_feed(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ["xml", "rss", "atom"].iter().any(|t| ct.contains(t))
}

fn entry_from_node(node: &Node) -> FeedEntry {
    let text_of = |names: &[&str]| {
        node.first_child(names)
            .map(|n| n.text().to_string())
            .unwrap_or_default()
    };

    FeedEntry {
        title: text_of(&["title"]),
        link: entry_link(node),
        author: entry_author(node),
        published: text_of(&["pubDate", "updated", "published", "date"]),
        content: text_of(&["description", "content", "summary"]),
    }
}

/// RSS puts the URL in the element text, Atom in `href`; Atom may carry
/// several links, of which the `alternate` one is the post.
fn entry_link(node: &Node) -> String {
    let links: Vec<&Node> = node.children.iter().filter(|c| c.name == "link").collect();
    let preferred = links
        .iter()
        .find(|l| matches!(l.attr("rel"), None | Some("alternate")))
        .or_else(|| links.first());

    match preferred {
        Some(link) if !link.text().is_empty() => link.text().to_string(),
        Some(link) => link.attr("href").unwrap_or_default().to_string(),
        None => String::new(),
    }
}

fn entry_author(node: &Node) -> String {
    let name = node
        .first_child(&["author", "creator"])
        .map(|author| {
            if author.text().is_empty() {
                author.child("name").map(|n| n.text()).unwrap_or_default()
            } else {
                author.text()
            }
        })
        .unwrap_or_default();

    let name = name
        .strip_prefix("/u/")
        .or_else(|| name.strip_prefix("u/"))
        .unwrap_or(name);
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name.to_string()
    }
}

fn parse_tree(xml: &str) -> Result<Node, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    // Bottom of the stack is a synthetic document node.
    let mut stack: Vec<Node> = vec![Node::default()];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(open_node(&e, &reader)?),
            Ok(Event::Empty(e)) => {
                let node = open_node(&e, &reader)?;
                attach(&mut stack, node);
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    if let Some(node) = stack.pop() {
                        attach(&mut stack, node);
                    }
                }
            }
            Ok(Event::Text(t)) => push_text(&mut stack, &String::from_utf8_lossy(&t)),
            Ok(Event::CData(c)) => push_text(&mut stack, &String::from_utf8_lossy(&c)),
            Ok(Event::GeneralRef(r)) => {
                push_text(&mut stack, &resolve_entity(&String::from_utf8_lossy(&r)))
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::Xml(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(FetchError::Xml("unexpected end of document".to_string()));
    }
    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().next())
        .ok_or_else(|| FetchError::Xml("document has no root element".to_string()))
}

fn open_node(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Node, FetchError> {
    let mut node = Node {
        name: String::from_utf8_lossy(e.local_name().as_ref()).to_string(),
        ..Node::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| FetchError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| FetchError::Xml(e.to_string()))?
            .to_string();
        node.attrs.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [Node], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Node], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.push_str(text);
    }
}

fn resolve_entity(name: &str) -> String {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        if let Some(c) = code.and_then(char::from_u32) {
            return c.to_string();
        }
    }
    match name {
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "amp" => "&".to_string(),
        "apos" => "'".to_string(),
        "quot" => "\"".to_string(),
        other => format!("&{};", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <category term="macapps" label="r/macapps"/>
  <updated>2024-05-01T10:00:00+00:00</updated>
  <title>Mac Apps</title>
  <entry>
    <author><name>/u/alice</name><uri>https://www.reddit.com/user/alice</uri></author>
    <category term="macapps" label="r/macapps"/>
    <content type="html">&lt;p&gt;Fast &amp;amp; small&lt;/p&gt;</content>
    <id>t3_abc123</id>
    <media:thumbnail url="https://example.com/t.jpg"/>
    <link href="https://www.reddit.com/r/macapps/comments/abc123/fast_app/"/>
    <updated>2024-05-01T09:00:00+00:00</updated>
    <published>2024-05-01T08:00:00+00:00</published>
    <title>Fast &amp; small app</title>
  </entry>
  <entry>
    <author><name>/u/bob</name></author>
    <id>t3_def456</id>
    <link href="https://www.reddit.com/r/macapps/comments/def456/other/"/>
    <updated>2024-05-01T07:00:00+00:00</updated>
    <title>Other</title>
  </entry>
</feed>"#;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example</title>
    <item>
      <title>First item</title>
      <link>https://old.reddit.com/r/macapps/comments/zz9/first/</link>
      <dc:creator>carol</dc:creator>
      <pubDate>Wed, 01 May 2024 10:00:00 GMT</pubDate>
      <description><![CDATA[<b>bold</b> body]]></description>
    </item>
    <item>
      <title>No author</title>
      <link>https://example.com/elsewhere</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_atom() {
        let entries = parse_feed(ATOM).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "Fast & small app");
        assert_eq!(
            first.link,
            "https://www.reddit.com/r/macapps/comments/abc123/fast_app/"
        );
        assert_eq!(first.author, "alice");
        assert_eq!(first.published, "2024-05-01T09:00:00+00:00");
        assert_eq!(first.content, "<p>Fast &amp; small</p>");

        assert_eq!(entries[1].author, "bob");
        assert_eq!(entries[1].content, "");
    }

    #[test]
    fn test_parse_rss() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "First item");
        assert_eq!(entries[0].author, "carol");
        assert_eq!(entries[0].published, "Wed, 01 May 2024 10:00:00 GMT");
        assert_eq!(entries[0].content, "<b>bold</b> body");
        assert_eq!(entries[1].author, "unknown");
        assert_eq!(entries[1].published, "");
    }

    #[test]
    fn test_empty_feed() {
        let entries = parse_feed(r#"<rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_malformed_feed() {
        assert!(matches!(parse_feed("<rss><channel>"), Err(FetchError::Xml(_))));
        assert!(matches!(parse_feed("just text"), Err(FetchError::Xml(_))));
    }

    #[test]
    fn test_numeric_entities() {
        let entries = parse_feed(
            "<rss><channel><item><title>caf&#233; &#x2014; ok</title></item></channel></rss>",
        )
        .unwrap();
        assert_eq!(entries[0].title, "café — ok");
    }

    #[test]
    fn test_post_refs() {
        let entries = parse_feed(ATOM).unwrap();
        let refs = post_refs(&entries);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "abc123");
        assert_eq!(refs[1].id, "def456");

        let rss_refs = post_refs(&parse_feed(RSS).unwrap());
        assert_eq!(rss_refs.len(), 1);
        assert_eq!(rss_refs[0].id, "zz9");
    }

    #[test]
    fn test_post_refs_deduplicates() {
        let entry = FeedEntry {
            link: "https://www.reddit.com/r/a/comments/x1/t/".to_string(),
            ..FeedEntry::default()
        };
        let refs = post_refs(&[entry.clone(), entry]);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_post_ref_requires_trailing_slash() {
        assert!(post_ref("https://www.reddit.com/r/a/comments/x1").is_none());
        assert!(post_ref("https://www.reddit.com/r/a/").is_none());
    }

    #[test]
    fn test_looks_like_feed() {
        assert!(looks_like_feed("application/atom+xml; charset=UTF-8"));
        assert!(looks_like_feed("text/XML"));
        assert!(looks_like_feed("application/rss"));
        assert!(!looks_like_feed("text/html; charset=utf-8"));
        assert!(!looks_like_feed(""));
    }
}
