// src/config/options.rs

use std::path::PathBuf;

/// Run options for one enhancement pass.
///
/// This is the whole configuration surface; there is deliberately no
/// catch-all bag of stringly-typed extras.
#[derive(Clone, Debug, Default)]
pub struct EnhanceOptions {
    /// The export file; enriched columns are written back to this path.
    pub csv_path: PathBuf,
    /// Previously enhanced export to carry unchanged rows forward from.
    pub update_path: Option<PathBuf>,
    /// Process every book, not just those without derived fields.
    pub force: bool,
    /// Log per-book failures and keep going instead of aborting.
    pub ignore_errors: bool,
    /// Keep a genre only if it has strictly more than this many votes.
    pub min_genre_votes: Option<u32>,
    /// Keep a genre only if it has at least this fraction of the
    /// most-voted valid genre's votes.
    pub min_genre_vote_frac: Option<f64>,
}

/// User-facing genre-vote threshold: an absolute count, or a percentage of
/// the top valid genre ("25" vs "25%").
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GenreVotes {
    Absolute(u32),
    Fraction(f64),
}

/// Parse the `-g/--genre-votes` value.
pub fn parse_genre_votes(raw: &str) -> Result<GenreVotes, String> {
    let trimmed = raw.trim();
    let (number, is_percent) = match trimmed.strip_suffix('%') {
        Some(n) => (n.trim(), true),
        None => (trimmed, false),
    };
    let value: f64 = number.parse().map_err(|_| {
        format!("invalid genre-votes value {raw:?}: expected a number or a percentage")
    })?;
    if is_percent {
        Ok(GenreVotes::Fraction(value / 100.0))
    } else {
        Ok(GenreVotes::Absolute(value as u32))
    }
}

impl EnhanceOptions {
    /// Apply a parsed threshold to the matching option field.
    pub fn set_genre_votes(&mut self, votes: GenreVotes) {
        match votes {
            GenreVotes::Absolute(n) => self.min_genre_votes = Some(n),
            GenreVotes::Fraction(f) => self.min_genre_vote_frac = Some(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_and_percentage_values() {
        assert_eq!(parse_genre_votes("25"), Ok(GenreVotes::Absolute(25)));
        assert_eq!(parse_genre_votes(" 10 % "), Ok(GenreVotes::Fraction(0.1)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_genre_votes("lots").is_err());
        assert!(parse_genre_votes("%").is_err());
    }
}
