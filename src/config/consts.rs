// src/config/consts.rs

// Site endpoints
pub const BASE_URL: &str = "https://www.goodreads.com";
pub const SIGNIN_URL: &str = "https://www.goodreads.com/user/sign_in";
pub const SIGNIN_POST_URL: &str = "https://www.goodreads.com/ap/signin";
pub const POST_LOGIN_URL: &str = "https://www.goodreads.com/";

// Sent on every request; the metadata1 blob embeds the same string, the two
// must not disagree.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/101.0.4951.54 Safari/537.36";

// Net
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const FETCH_MAX_TRIES: u32 = 3;
pub const FETCH_BACKOFF_BASE_MS: u64 = 250;
pub const FETCH_BACKOFF_TOTAL_MS: u64 = 2_000;

// Enhancement loop
pub const CHECKPOINT_EVERY: usize = 20;
pub const MAX_GENRES: usize = 20;

/// Columns the export file must carry before we touch the network.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "Book Id",
    "Title",
    "Author",
    "Date Read",
    "Exclusive Shelf",
];

/// Administrative shelf names that are not genres. Compared against the
/// normalized (hyphens replaced, lowercased) shelf name, hence the spaces.
pub const IGNORE_GENRES: [&str; 18] = [
    "to read",
    "currently reading",
    "owned",
    "own it",
    "default",
    "books i own",
    "my books",
    "re read",
    "library",
    "my library",
    "wish list",
    "to buy",
    "dnf",
    "did not finish",
    "audiobook",
    "audiobooks",
    "ebook",
    "ebooks",
];

/// Shelf names containing any of these are user bookkeeping, not genres.
pub const IGNORE_GENRE_SUBSTRINGS: [&str; 12] = [
    "favorite",
    "favourite",
    "wishlist",
    "book club",
    "challenge",
    "kindle",
    "audio",
    "borrowed",
    "abandoned",
    "not finish",
    "read in",
    "tbr",
];
