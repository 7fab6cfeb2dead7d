//! Custom error types for tweetdb.
//!
//! Provides structured error handling with detailed context for better
//! diagnostics and user experience.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for tweetdb operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling better error messages and programmatic error handling.
#[derive(Error, Debug)]
pub enum TweetDbError {
    // =========================================================================
    // Remote API Errors
    // =========================================================================
    /// Transport-level failure talking to the upstream API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream API answered with a non-success status.
    #[error("API request to {endpoint} failed (HTTP {status}): {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Response body was not the JSON we expected.
    #[error("Failed to decode API response: {0}")]
    Json(#[from] serde_json::Error),

    /// A required credential was not configured.
    #[error("Missing credential '{name}'")]
    MissingCredential { name: &'static str },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The delete/insert swap into a permanent table failed and was rolled back.
    #[error("Replacing rows in '{table}' failed, transaction rolled back: {source}")]
    SwapFailed {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    PathError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV export failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    /// Keyword list could not be loaded.
    #[error("Keyword file not found at '{path}'")]
    KeywordFileNotFound { path: PathBuf },

    // =========================================================================
    // Data Validation Errors
    // =========================================================================
    /// Invalid date format in upstream or stored data.
    #[error("Invalid date format '{value}' in {context}")]
    InvalidDate { value: String, context: String },

    // =========================================================================
    // CLI Errors
    // =========================================================================
    /// Invalid command-line argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for tweetdb operations.
pub type Result<T> = std::result::Result<T, TweetDbError>;

impl TweetDbError {
    /// Create an API error.
    pub fn api(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an invalid date error.
    pub fn invalid_date(value: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PathError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Check if this error came from the upstream API or the network.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. } | Self::Json(_))
    }

    /// Check if this error is recoverable (user can fix it).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::KeywordFileNotFound { .. }
                | Self::ConfigError { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredential { .. } => Some(
                "Set it in the [credentials] section of config.toml or via TWEETDB_* environment variables.",
            ),
            Self::KeywordFileNotFound { .. } => Some(
                "Create a keywords.txt with one keyword per line, or point --keywords at one.",
            ),
            Self::Api { status: 401, .. } => {
                Some("Check that the consumer key/secret and access token/secret are valid.")
            }
            Self::Api { status: 404, .. } => Some("Check the screen name spelling."),
            Self::Api { status: 429, .. } => {
                Some("Rate limit reached. Wait for the window to reset and rerun.")
            }
            Self::SwapFailed { .. } => {
                Some("The previous rows were kept. It is safe to rerun the same command.")
            }
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context lazily (only evaluated on error).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TweetDbError::with_context(f(), e))
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a CLI error title with an optional hint line.
#[must_use]
pub fn format_error(title: &str, hint: Option<&str>) -> String {
    let mut output = format!("{} {}", "✗".red().bold(), title.bold());
    if let Some(hint) = hint {
        output.push_str(&format!("\n\n   {} {hint}", "Hint:".cyan()));
    }
    output
}

/// Render an error for the terminal, appending its suggestion when one exists.
#[must_use]
pub fn format_tweetdb_error(err: &TweetDbError) -> String {
    format_error(&err.to_string(), err.suggestion())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = TweetDbError::api("users/show.json", 404, "User not found.");
        let text = err.to_string();
        assert!(text.contains("users/show.json"));
        assert!(text.contains("404"));
        assert!(text.contains("User not found."));
        assert!(err.is_remote());
    }

    #[test]
    fn test_error_suggestions() {
        let err = TweetDbError::MissingCredential {
            name: "consumer_key",
        };
        assert!(err.suggestion().is_some());
        assert!(err.is_recoverable());
        assert!(!err.is_remote());
    }

    #[test]
    fn test_rate_limit_suggestion() {
        let err = TweetDbError::api("statuses/user_timeline.json", 429, "Rate limit exceeded");
        assert!(err.suggestion().unwrap().contains("Rate limit"));
    }

    #[test]
    fn test_swap_failed_keeps_source() {
        use std::error::Error as _;
        let err = TweetDbError::SwapFailed {
            table: "tweets",
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(err.to_string().contains("tweets"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TweetDbError = io_err.into();
        assert!(matches!(err, TweetDbError::IoError(_)));
    }

    #[test]
    fn test_from_rusqlite_error() {
        fn accepts_error(_: TweetDbError) {}
        let sqlite_err = rusqlite::Error::InvalidQuery;
        accepts_error(sqlite_err.into());
    }

    #[test]
    fn format_error_with_hint() {
        let output = format_error("Test Error", Some("Try this"));
        assert!(output.contains("Test Error"));
        assert!(output.contains("Hint:"));
        assert!(output.contains("Try this"));
    }

    #[test]
    fn format_error_without_hint() {
        let err = TweetDbError::InvalidArgument {
            reason: "bad".to_string(),
        };
        let output = format_tweetdb_error(&err);
        assert!(output.contains("Invalid argument: bad"));
        assert!(!output.contains("Hint:"));
    }

    #[test]
    fn format_tweetdb_error_includes_hint() {
        let err = TweetDbError::KeywordFileNotFound {
            path: PathBuf::from("keywords.txt"),
        };
        let output = format_tweetdb_error(&err);
        assert!(output.contains("keywords.txt"));
        assert!(output.contains("Hint:"));
    }
}
