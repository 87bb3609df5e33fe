// src/specs/book_page.rs
//
// The book detail page embeds its interesting fields in inline JSON blobs
// (sometimes HTML-escaped), so this spec scans the raw document instead of
// the DOM.

use std::sync::OnceLock;

use regex::Regex;

/// Total community rating count, from the embedded `ratingsCount` field.
pub fn extract_ratings_count(page: &str) -> Option<u64> {
    static RATINGS: OnceLock<Regex> = OnceLock::new();
    let re = RATINGS.get_or_init(|| {
        Regex::new(r#"(?:"|&quot;)ratingsCount(?:"|&quot;)\s*:\s*(\d+)"#).expect("valid regex")
    });
    re.captures(page)?.get(1)?.as_str().parse().ok()
}

/// Site-relative path of the shelves/votes page (`work/shelves/...`), from
/// the first link that mentions it. Absent on pages served to logged-out
/// clients, which is why callers treat `None` as a login warning.
pub fn extract_shelves_path(page: &str) -> Option<String> {
    static SHELVES: OnceLock<Regex> = OnceLock::new();
    let re = SHELVES.get_or_init(|| {
        Regex::new(r#"(?:"|&quot;)[^"&]*(work/shelves[^"&]+)(?:"|&quot;)"#).expect("valid regex")
    });
    Some(re.captures(page)?.get(1)?.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_count_from_plain_json() {
        let page = r#"{"ratingsCount": 12345, "reviewsCount": 678}"#;
        assert_eq!(extract_ratings_count(page), Some(12345));
    }

    #[test]
    fn ratings_count_from_escaped_json() {
        let page = "&quot;ratingsCount&quot;:987";
        assert_eq!(extract_ratings_count(page), Some(987));
    }

    #[test]
    fn missing_ratings_count_is_none() {
        assert_eq!(extract_ratings_count("<html>nothing</html>"), None);
    }

    #[test]
    fn shelves_path_is_captured_without_quotes() {
        let page = r#"<a data-url="https://www.goodreads.com/work/shelves/12345-title">shelves</a>
                      {"u":"work/shelves/12345-title?page=2"}"#;
        // The first match wins; the capture starts at `work/shelves`.
        assert_eq!(
            extract_shelves_path(page).as_deref(),
            Some("work/shelves/12345-title")
        );
    }

    #[test]
    fn missing_shelves_link_is_none() {
        assert_eq!(extract_shelves_path("plain page"), None);
    }
}
