// src/enhance.rs
//
// Drives the per-book pipeline: decide which rows need work, fetch, extract,
// merge, checkpoint. Strictly sequential; one authenticated session for the
// whole run.

use std::collections::HashMap;

use log::{info, warn};
use scraper::Html;

use crate::config::consts::{BASE_URL, CHECKPOINT_EVERY};
use crate::config::options::EnhanceOptions;
use crate::dataset::{self, DERIVED_COLUMNS, Dataset, Record};
use crate::error::EnhanceError;
use crate::login::{self, ChallengeSolver, Credentials};
use crate::net::PageFetcher;
use crate::progress::Progress;
use crate::specs::{book_page, reading_sessions, shelves};

fn book_url(book_id: &str) -> String {
    format!("{BASE_URL}/book/show/{book_id}")
}

fn review_url(book_id: &str) -> String {
    format!("{BASE_URL}/review/edit/{book_id}")
}

/// Whole run: load + validate the datasets, carry forward, log in, enrich,
/// checkpointing back to the export file.
pub fn run(
    options: &EnhanceOptions,
    credentials: &Credentials,
    solver: &mut dyn ChallengeSolver,
    progress: &mut dyn Progress,
) -> Result<(), EnhanceError> {
    let mut books = dataset::read_export(&options.csv_path)?;
    books.ensure_derived_columns();

    if let Some(update_path) = &options.update_path {
        let old = dataset::read_export(update_path)?;
        let carried = carry_forward(&mut books, &old);
        info!("carried {carried} unchanged books forward from {}", update_path.display());
    }

    let pending = select_pending(&books, options.force);

    let mut session = login::login(credentials, solver)?;

    let csv_path = options.csv_path.clone();
    enhance_records(
        &mut books,
        &pending,
        &mut session,
        options,
        progress,
        &mut |ds| dataset::write_export(ds, &csv_path),
    )
}

/// Copy the derived fields from a previously enhanced dataset for every book
/// whose shelf and read date are unchanged. Returns how many books matched.
pub fn carry_forward(books: &mut Dataset, old: &Dataset) -> usize {
    let old_by_id: HashMap<&str, &Record> = old
        .rows
        .iter()
        .map(|row| (row.get("Book Id"), row))
        .collect();

    let mut carried = 0;
    for book in &mut books.rows {
        let Some(old_book) = old_by_id.get(book.get("Book Id")) else {
            continue;
        };
        let unchanged = old_book.get("Exclusive Shelf") == book.get("Exclusive Shelf")
            && old_book.get("Date Read") == book.get("Date Read");
        if !unchanged {
            continue;
        }
        for column in DERIVED_COLUMNS {
            let value = old_book.get(column);
            if !value.is_empty() {
                book.set(column, value);
            }
        }
        carried += 1;
    }
    carried
}

/// Indices of the books to process, in dataset order: everything under
/// `force`, otherwise only books with none of the derived fields yet.
pub fn select_pending(books: &Dataset, force: bool) -> Vec<usize> {
    books
        .rows
        .iter()
        .enumerate()
        .filter(|(_, book)| {
            force
                || (book.get("genres").is_empty()
                    && book.get("read_dates").is_empty()
                    && book.get("n_ratings").is_empty())
        })
        .map(|(i, _)| i)
        .collect()
}

/// The enrichment loop proper. Checkpoints the *entire* dataset after every
/// 20th processed book and after the last one, so a crash or abort loses at
/// most the in-flight batch.
pub fn enhance_records(
    books: &mut Dataset,
    pending: &[usize],
    fetcher: &mut dyn PageFetcher,
    options: &EnhanceOptions,
    progress: &mut dyn Progress,
    checkpoint: &mut dyn FnMut(&Dataset) -> Result<(), EnhanceError>,
) -> Result<(), EnhanceError> {
    progress.begin(pending.len());

    for (i, &index) in pending.iter().enumerate() {
        {
            let book = &books.rows[index];
            progress.log(&format!(
                "Book {} of {}: {} ({})",
                i + 1,
                pending.len(),
                book.get("Title"),
                book.get("Author"),
            ));
        }

        match update_book(&mut books.rows[index], fetcher, options) {
            Ok(()) => {
                let id = books.rows[index].get("Book Id").to_string();
                progress.book_done(&id);
            }
            Err(e) if options.ignore_errors => {
                warn!("error updating book, skipping: {e}");
                progress.log(&format!("Error updating book, skipping: {e}"));
            }
            Err(e) => return Err(e),
        }

        if i % CHECKPOINT_EVERY == CHECKPOINT_EVERY - 1 || i == pending.len() - 1 {
            progress.log("saving csv");
            checkpoint(books)?;
        }
    }

    progress.log("Finished processing!");
    progress.finish();
    Ok(())
}

/// Enrich one book: reading intervals from its review page, rating count and
/// shelves link from its detail page, genres from the shelves page.
fn update_book(
    book: &mut Record,
    fetcher: &mut dyn PageFetcher,
    options: &EnhanceOptions,
) -> Result<(), EnhanceError> {
    let book_id = book.get("Book Id").to_string();
    let author = book.get("Author").to_string();

    let review_page = fetcher.get(&review_url(&book_id))?;
    let review_doc = Html::parse_document(&review_page);
    let intervals = reading_sessions::extract_intervals(&review_doc);
    book.set("read_dates", reading_sessions::serialize_intervals(&intervals));

    let detail_page = fetcher.get(&book_url(&book_id))?;
    let n_ratings = book_page::extract_ratings_count(&detail_page).ok_or_else(|| {
        EnhanceError::Extraction(format!("no ratings count on the page for book {book_id}"))
    })?;
    book.set("n_ratings", n_ratings.to_string());

    let Some(shelves_path) = book_page::extract_shelves_path(&detail_page) else {
        // Logged-out clients get a page without this link; most likely the
        // session expired rather than the markup changed.
        warn!("no shelves link on the page for book {book_id}, not adding genres (login expired?)");
        return Ok(());
    };

    let shelves_page = fetcher.get(&format!("{BASE_URL}/{shelves_path}"))?;
    let shelves_doc = Html::parse_document(&shelves_page);
    let genres = shelves::extract_genres(
        &shelves_doc,
        &author,
        options.min_genre_votes,
        options.min_genre_vote_frac,
    );
    book.set("genres", shelves::serialize_genres(&genres));

    Ok(())
}
