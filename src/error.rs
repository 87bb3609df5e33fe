// src/error.rs

use thiserror::Error;

/// Everything that can stop (or dent) an enhancement run.
///
/// Fatality rules:
/// - `DatasetFormat` aborts before any network activity.
/// - `Auth` and `Cipher` abort the run.
/// - `Network` is retried internally first; once escalated it aborts unless
///   the run was started with `ignore_errors`.
/// - `Extraction` aborts a single book the same way `Network` does; most
///   missing-markup cases are downgraded to diagnostics at the call site.
#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("export file problem: {0}")]
    DatasetFormat(String),

    #[error("login failed: {0}")]
    Auth(String),

    #[error("network request failed: {0}")]
    Network(String),

    #[error("page markup mismatch: {0}")]
    Extraction(String),

    #[error("device metadata codec: {0}")]
    Cipher(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
