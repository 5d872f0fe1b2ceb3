//! Custom error types for rustpubcat.
//!
//! Library functions return `Result<T, PubcatError>`; the binary wraps them
//! in `anyhow` for operator-facing context.

use thiserror::Error;

/// Main error type for rustpubcat operations.
#[derive(Debug, Error)]
pub enum PubcatError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response or artifact content could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// The statistical scorer failed or answered inconsistently
    #[error("Scorer error: {0}")]
    Scorer(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl From<tempfile::PersistError> for PubcatError {
    fn from(e: tempfile::PersistError) -> Self {
        PubcatError::Io(e.error)
    }
}

/// Result type alias using `PubcatError`
pub type Result<T> = std::result::Result<T, PubcatError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| PubcatError::Parse(msg.to_string()))
    }
}
