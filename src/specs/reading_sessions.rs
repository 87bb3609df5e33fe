// src/specs/reading_sessions.rs
//
// Extracts (start, finish) reading intervals from a book's review page.
// A start without a recorded finish never becomes an interval; a finish
// without a start does, with the start left empty.

use chrono::NaiveDate;
use log::debug;
use scraper::{ElementRef, Html, Selector};

use super::css;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadingInterval {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

/// Current review-page markup: one `.readingSessionRow` per read-through,
/// each side of the session a triple of day/month/year selects with the
/// chosen option carrying a `selected` attribute.
///
/// Rows whose end date is missing or unparseable are skipped; the result is
/// sorted by end date ascending, oldest completion first.
pub fn extract_intervals(doc: &Html) -> Vec<ReadingInterval> {
    let mut intervals = Vec::new();
    let mut saw_rows = false;

    for row in doc.select(&css(".readingSessionRow")) {
        saw_rows = true;
        let start = side_date(row, "start");
        let Some(end) = side_date(row, "end") else {
            continue;
        };
        intervals.push(ReadingInterval { start, end });
    }
    if !saw_rows {
        debug!("no reading session rows on the review page");
    }

    intervals.sort_by_key(|iv| iv.end);
    intervals
}

/// `start,end` per interval (`%Y-%m-%d`, empty start when unknown),
/// intervals joined by `;`.
pub fn serialize_intervals(intervals: &[ReadingInterval]) -> String {
    intervals
        .iter()
        .map(|iv| {
            let start = iv
                .start
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            format!("{start},{}", iv.end.format("%Y-%m-%d"))
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn side_date(row: ElementRef<'_>, side: &str) -> Option<NaiveDate> {
    let mut parts = [String::new(), String::new(), String::new()];
    for (slot, part) in parts.iter_mut().zip(["Day", "Month", "Year"]) {
        let selector = Selector::parse(&format!(".{side}{part} .setDate[selected]")).ok()?;
        if let Some(el) = row.select(&selector).next() {
            *slot = el.text().collect::<String>().trim().to_string();
        }
    }
    if parts.iter().all(|p| p.is_empty()) {
        return None;
    }
    parse_partial_date(&parts[0], &parts[1], &parts[2])
}

/// Missing components default to 1900-01-01's; an unparseable token makes
/// the whole date unusable (caller skips, never fails).
fn parse_partial_date(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let day: u32 = if day.is_empty() { 1 } else { day.parse().ok()? };
    let month = if month.is_empty() { 1 } else { month_number(month)? };
    let year: i32 = if year.is_empty() { 1900 } else { year.parse().ok()? };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    if name.chars().all(|c| c.is_ascii_digit()) {
        let n = name.parse().ok()?;
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
}

/* ---------------- deprecated timeline markup ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineMark {
    Started,
    Finished,
}

/// Pair a chronological stream of started/finished markers into intervals.
/// Each start is held pending until a finish consumes it; a finish with no
/// pending start produces an interval with an empty start.
pub fn pair_timeline_events(events: &[(TimelineMark, NaiveDate)]) -> Vec<ReadingInterval> {
    let mut pending: Option<NaiveDate> = None;
    let mut intervals = Vec::new();
    for &(mark, date) in events {
        match mark {
            TimelineMark::Started => pending = Some(date),
            TimelineMark::Finished => intervals.push(ReadingInterval {
                start: pending.take(),
                end: date,
            }),
        }
    }
    intervals
}

/// Older review-page markup: a flat `.readingTimeline` list of rows like
/// "May 5, 2020 – Started Reading", most recent first. Deprecated in favour
/// of [`extract_intervals`]; kept for the previous page generation.
pub fn extract_intervals_from_timeline(doc: &Html) -> Vec<ReadingInterval> {
    let mut events = Vec::new();
    for row in doc.select(&css(".readingTimeline .readingTimeline__text")) {
        let text = row.text().collect::<String>();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mark = if text.contains("Started Reading") {
            TimelineMark::Started
        } else if text.contains("Finished Reading") {
            TimelineMark::Finished
        } else {
            continue;
        };
        let Some(date) = parse_timeline_date(&text) else {
            continue;
        };
        events.push((mark, date));
    }
    // The page lists newest events first; pairing needs oldest first.
    events.reverse();
    pair_timeline_events(&events)
}

fn parse_timeline_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.split('–').next()?.trim();
    NaiveDate::parse_from_str(date_part, "%B %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{date_part} 1"), "%B %Y %d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const SESSION_PAGE: &str = r#"
      <div class="editReview">
        <div class="readingSessionRow">
          <span class="startDay"><option class="setDate" selected>12</option></span>
          <span class="startMonth"><option class="setDate" selected>Jun</option></span>
          <span class="startYear"><option class="setDate" selected>2021</option></span>
          <span class="endDay"><option class="setDate" selected>30</option></span>
          <span class="endMonth"><option class="setDate" selected>Jun</option></span>
          <span class="endYear"><option class="setDate" selected>2021</option></span>
        </div>
        <div class="readingSessionRow">
          <span class="startDay"></span>
          <span class="startMonth"></span>
          <span class="startYear"></span>
          <span class="endDay"><option class="setDate" selected>1</option></span>
          <span class="endMonth"><option class="setDate" selected>Feb</option></span>
          <span class="endYear"><option class="setDate" selected>2019</option></span>
        </div>
        <div class="readingSessionRow">
          <span class="startDay"><option class="setDate" selected>3</option></span>
          <span class="startMonth"><option class="setDate" selected>Mar</option></span>
          <span class="startYear"><option class="setDate" selected>2022</option></span>
          <span class="endDay"></span>
          <span class="endMonth"></span>
          <span class="endYear"></span>
        </div>
      </div>
    "#;

    #[test]
    fn session_rows_parse_and_sort_by_end() {
        let doc = Html::parse_document(SESSION_PAGE);
        let intervals = extract_intervals(&doc);
        // Third row has no end date and is dropped; remaining two sort by end.
        assert_eq!(
            intervals,
            vec![
                ReadingInterval { start: None, end: d(2019, 2, 1) },
                ReadingInterval { start: Some(d(2021, 6, 12)), end: d(2021, 6, 30) },
            ]
        );
    }

    #[test]
    fn missing_container_yields_empty() {
        let doc = Html::parse_document("<html><body><p>no sessions</p></body></html>");
        assert!(extract_intervals(&doc).is_empty());
    }

    #[test]
    fn partial_dates_default_to_1900() {
        assert_eq!(parse_partial_date("", "Jun", ""), Some(d(1900, 6, 1)));
        assert_eq!(parse_partial_date("", "", "2020"), Some(d(2020, 1, 1)));
        assert_eq!(parse_partial_date("15", "", ""), Some(d(1900, 1, 15)));
    }

    #[test]
    fn unparseable_tokens_are_skipped_not_fatal() {
        assert_eq!(parse_partial_date("xx", "Jun", "2020"), None);
        assert_eq!(parse_partial_date("31", "Feb", "2020"), None);
    }

    #[test]
    fn serialization_joins_with_semicolons() {
        let intervals = vec![
            ReadingInterval { start: Some(d(2020, 1, 1)), end: d(2020, 2, 1) },
            ReadingInterval { start: None, end: d(2020, 3, 1) },
        ];
        assert_eq!(
            serialize_intervals(&intervals),
            "2020-01-01,2020-02-01;,2020-03-01"
        );
    }

    #[test]
    fn finish_without_start_closes_an_open_interval() {
        let events = [
            (TimelineMark::Started, d(2020, 1, 1)),
            (TimelineMark::Finished, d(2020, 2, 1)),
            (TimelineMark::Finished, d(2020, 3, 1)),
        ];
        assert_eq!(
            pair_timeline_events(&events),
            vec![
                ReadingInterval { start: Some(d(2020, 1, 1)), end: d(2020, 2, 1) },
                ReadingInterval { start: None, end: d(2020, 3, 1) },
            ]
        );
    }

    #[test]
    fn timeline_markup_is_reversed_before_pairing() {
        let page = r#"
          <div class="readingTimeline">
            <div class="readingTimeline__text">March 1, 2020 – Finished Reading</div>
            <div class="readingTimeline__text">January 15, 2020 – Started Reading</div>
          </div>
        "#;
        let doc = Html::parse_document(page);
        assert_eq!(
            extract_intervals_from_timeline(&doc),
            vec![ReadingInterval { start: Some(d(2020, 1, 15)), end: d(2020, 3, 1) }]
        );
    }
}
