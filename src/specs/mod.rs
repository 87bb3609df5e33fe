// src/specs/mod.rs
//! Page-specific extraction specs.
//!
//! Each spec knows *where the ground truth lives in one page's markup* and
//! how to pull it out tolerantly. All CSS-class/element coupling to the site
//! is confined here: when the site's markup changes, these are the only
//! modules that should need editing.
//!
//! Specs do no networking, caching or merging; they take fetched documents
//! and return plain values. Higher layers decide when to fetch and what to
//! do with the result.

pub mod book_page;
pub mod reading_sessions;
pub mod shelves;

use scraper::Selector;

/// Parse a fixed selector. These are compile-time constants in practice; a
/// failure is a programmer bug, not a runtime condition.
pub(crate) fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector")
}
