// src/progress.rs

/// Lightweight progress reporting for the long-running enhancement loop.
/// Frontends implement this to surface status to users.
pub trait Progress {
    /// Called once with the number of books selected for processing.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// Called when one book has been fully enriched.
    fn book_done(&mut self, _book_id: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// Prints every status line to stdout. The CLI frontend.
pub struct ConsoleProgress;
impl Progress for ConsoleProgress {
    fn log(&mut self, msg: &str) {
        println!("{msg}");
    }
}
