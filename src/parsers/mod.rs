//! Parsers turning response bodies into flat post records.
//!
//! - [`listing`]: listing JSON from the public endpoint and the OAuth API
//! - [`feed`]: RSS 2.0 / Atom feeds
//! - [`page`]: heuristics over a post's HTML page

pub mod feed;
pub mod listing;
pub mod page;
