// src/specs/shelves.rs
//
// Turns a book's shelf/vote listing into ranked genre tags. Shelves are
// community-named, so most of the work is throwing away the ones that are
// bookkeeping ("to-read"), self-reference (author-named shelves) or noise.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use scraper::Html;

use super::css;
use crate::config::consts::{IGNORE_GENRES, IGNORE_GENRE_SUBSTRINGS, MAX_GENRES};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenreTag {
    pub name: String,
    pub votes: u32,
}

/// Collect raw shelf entries and run them through [`filter_genres`].
///
/// Each `.shelfStat` block carries two non-empty text lines: the shelf name
/// and a vote count (possibly decorated, digits are extracted). Blocks that
/// do not fit that shape are skipped with a diagnostic.
pub fn extract_genres(
    doc: &Html,
    author: &str,
    min_votes: Option<u32>,
    min_frac: Option<f64>,
) -> Vec<GenreTag> {
    let mut tags = Vec::new();
    for entry in doc.select(&css(".shelfStat")) {
        let text = entry.text().collect::<String>();
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.len() != 2 {
            debug!("skipping shelf entry with {} text lines", lines.len());
            continue;
        }
        let digits: String = lines[1].chars().filter(char::is_ascii_digit).collect();
        let Ok(votes) = digits.parse() else {
            debug!("shelf entry {:?} has no vote count", lines[0]);
            continue;
        };
        tags.push(GenreTag { name: lines[0].to_string(), votes });
    }
    filter_genres(tags, author, min_votes, min_frac)
}

/// Rank and filter shelf tags:
/// sort by votes descending (stable) → normalize names → drop invalid names
/// → apply the configured vote thresholds (the fraction is taken of the
/// most-voted *valid* tag) → keep the top 20.
///
/// Filtering an already filtered list with the same thresholds is a no-op.
pub fn filter_genres(
    mut tags: Vec<GenreTag>,
    author: &str,
    min_votes: Option<u32>,
    min_frac: Option<f64>,
) -> Vec<GenreTag> {
    tags.sort_by(|a, b| b.votes.cmp(&a.votes));
    for tag in &mut tags {
        tag.name = title_case(&tag.name.replace('-', " "));
    }

    let author_tokens = author_tokens(author);
    tags.retain(|tag| valid_genre(&tag.name, &author_tokens));

    let max_votes = tags.iter().map(|t| t.votes).max().unwrap_or(0);
    tags.retain(|tag| {
        min_votes.is_none_or(|min| tag.votes > min)
            && min_frac.is_none_or(|frac| tag.votes as f64 >= frac * max_votes as f64)
    });

    tags.truncate(MAX_GENRES);
    tags
}

/// `name|votes` groups joined by `;`. The name slot is a one-element list
/// (comma-joined) for compatibility with the retired nested-genre taxonomy.
pub fn serialize_genres(tags: &[GenreTag]) -> String {
    tags.iter()
        .map(|tag| format!("{}|{}", tag.name, tag.votes))
        .collect::<Vec<_>>()
        .join(";")
}

fn valid_genre(name: &str, author_tokens: &[String]) -> bool {
    let lower = name.to_ascii_lowercase();
    if IGNORE_GENRES.contains(&lower.as_str()) {
        return false;
    }
    if IGNORE_GENRE_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return false;
    }
    if author_tokens.iter().any(|t| lower.contains(t.as_str())) {
        return false;
    }
    if !lower.is_empty() && lower.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    true
}

/// Leading word of three or more word-characters from each part of the
/// author's name; "J. R. R. Tolkien" contributes just "tolkien".
fn author_tokens(author: &str) -> Vec<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN.get_or_init(|| Regex::new(r"^\w{3,}").expect("valid regex"));
    author
        .split_whitespace()
        .filter_map(|part| re.find(part))
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// First letter of every word upper-cased, the rest lowered.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, votes: u32) -> GenreTag {
        GenreTag { name: name.to_string(), votes }
    }

    #[test]
    fn ranking_drops_admin_shelves_and_keeps_vote_order() {
        let tags = vec![tag("Fantasy", 50), tag("To Read", 999), tag("Scifi", 10)];
        let out = filter_genres(tags, "Jane Doe", None, None);
        assert_eq!(out, vec![tag("Fantasy", 50), tag("Scifi", 10)]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let tags = vec![
            tag("high-fantasy", 120),
            tag("to-read", 999),
            tag("Epic", 40),
            tag("2021", 30),
        ];
        let once = filter_genres(tags, "Robin Hobb", Some(20), Some(0.1));
        let twice = filter_genres(once.clone(), "Robin Hobb", Some(20), Some(0.1));
        assert_eq!(once, twice);
    }

    #[test]
    fn author_named_shelves_are_rejected() {
        let tags = vec![tag("Tolkien Collection", 80), tag("Fantasy", 10)];
        let out = filter_genres(tags, "J. R. R. Tolkien", None, None);
        assert_eq!(out, vec![tag("Fantasy", 10)]);
    }

    #[test]
    fn short_author_parts_do_not_poison_filtering() {
        // "J." and "R." are below the three-character token floor.
        let tags = vec![tag("Romance", 25)];
        let out = filter_genres(tags, "J. R. R. Tolkien", None, None);
        assert_eq!(out, vec![tag("Romance", 25)]);
    }

    #[test]
    fn numeric_shelves_are_rejected() {
        let out = filter_genres(vec![tag("1984", 50), tag("Dystopia", 5)], "", None, None);
        assert_eq!(out, vec![tag("Dystopia", 5)]);
    }

    #[test]
    fn hyphens_become_spaces_and_names_title_case() {
        let out = filter_genres(vec![tag("science-fiction", 9)], "", None, None);
        assert_eq!(out, vec![tag("Science Fiction", 9)]);
    }

    #[test]
    fn absolute_threshold_is_strict() {
        let tags = vec![tag("Fantasy", 21), tag("Epic", 20), tag("Quest", 19)];
        let out = filter_genres(tags, "", Some(20), None);
        assert_eq!(out, vec![tag("Fantasy", 21)]);
    }

    #[test]
    fn fraction_threshold_uses_the_top_valid_tag() {
        // "to-read" is invalid, so the fraction is taken of 100, not 999.
        let tags = vec![
            tag("to-read", 999),
            tag("Fantasy", 100),
            tag("Epic", 50),
            tag("Quest", 49),
        ];
        let out = filter_genres(tags, "", None, Some(0.5));
        assert_eq!(out, vec![tag("Fantasy", 100), tag("Epic", 50)]);
    }

    #[test]
    fn at_most_twenty_tags_survive() {
        let tags: Vec<_> = (0..30).map(|i| tag(&format!("Genre{i}"), 100 - i)).collect();
        assert_eq!(filter_genres(tags, "", None, None).len(), 20);
    }

    #[test]
    fn serialization_matches_the_legacy_format() {
        let tags = vec![tag("Fantasy", 50), tag("Scifi", 10)];
        assert_eq!(serialize_genres(&tags), "Fantasy|50;Scifi|10");
    }

    #[test]
    fn shelf_entries_parse_from_markup() {
        let page = r#"
          <div class="leftContainer">
            <div class="shelfStat">
              <a href="/genres/fantasy">high-fantasy</a>
              <div class="smallText">1,204 people</div>
            </div>
            <div class="shelfStat">
              <a href="/shelf/to-read">to-read</a>
              <div class="smallText">99,999 people</div>
            </div>
            <div class="shelfStat">
              <a href="/shelf/broken">broken entry</a>
            </div>
          </div>
        "#;
        let doc = Html::parse_document(page);
        let out = extract_genres(&doc, "Robin Hobb", None, None);
        assert_eq!(out, vec![tag("High Fantasy", 1204)]);
    }
}
