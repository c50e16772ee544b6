//! Error types for genhl

use thiserror::Error;

/// Result type alias for highlighter operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighter error types
///
/// Highlighting itself never fails; these cover loading definitions,
/// reading style overrides and the command-line front end.
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid definition: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid style overrides at position {position}: {message}")]
    Overrides { position: usize, message: String },

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("{0}")]
    Message(String),
}
