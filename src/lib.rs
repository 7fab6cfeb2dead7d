//! tweetdb - personal Twitter archive in `SQLite`
//!
//! Pulls tweets, profiles, followers and friends from the Twitter v1.1 API
//! into a local database and runs a keyword-frequency analysis over the
//! stored tweets.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions and flag-string parsing
//! - [`error`] - Custom error types with rich context
//! - [`model`] - API payloads and table rows
//! - [`remote`] - Paged record streams and the Twitter API client
//! - [`storage`] - `SQLite` storage with stage-then-swap replacement
//! - [`pipeline`] - Fetch-and-upsert operations and the session context
//! - [`analyze`] - Keyword matching, tallies and `READ.csv`

pub mod analyze;
pub mod chart;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod model;
pub mod oauth;
pub mod pipeline;
pub mod remote;
pub mod storage;

pub use cli::{Cli, Operation, Plan, USAGE, parse_plan};
pub use config::Config;
pub use credentials::Credentials;
pub use error::{Result, ResultExt, TweetDbError, format_error, format_tweetdb_error};
pub use model::*;
pub use pipeline::{FetchKind, FetchReport, Session, SessionOptions, SwapOutcome};
pub use remote::{RecordStream, RemoteSource, TwitterClient};
pub use storage::Storage;

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "twitter.db";

/// Default keyword list filename
pub const DEFAULT_KEYWORDS_FILE: &str = "keywords.txt";

/// Base URL of the v1.1 REST API
pub const DEFAULT_API_URL: &str = "https://api.twitter.com/1.1";

/// Most tweets the upstream timeline will ever return for one account.
pub const TWEET_CAP: usize = 3250;

/// Most followers or friends collected per fetch.
pub const EDGE_CAP: usize = 1000;

/// Standard width for content dividers in CLI output
pub const CONTENT_DIVIDER_WIDTH: usize = 60;

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let abs = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(abs.len() + abs.len() / 3);

    for (idx, ch) in abs.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut formatted: String = out.chars().rev().collect();
    if value < 0 {
        formatted.insert(0, '-');
    }
    formatted
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    format_number(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Shorten text for a single table cell, flattening newlines.
#[must_use]
pub fn truncate_cell(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let kept: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
