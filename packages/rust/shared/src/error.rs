//! Error types for Deckhand.
//!
//! Library crates use [`DeckhandError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Deckhand operations.
#[derive(Debug, thiserror::Error)]
pub enum DeckhandError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Object store listing, fetch, or write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stack has no output with the requested key.
    #[error("resolution error: no output {output:?} found for stack {stack:?}")]
    Resolution { stack: String, output: String },

    /// Template could not be read, or has no substitution marker.
    #[error("template error: {message}")]
    Template { message: String },

    /// CDN invalidation request failed.
    #[error("cdn error: {0}")]
    Cdn(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed event, identifier, or data.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Missing or empty search query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DeckhandError>;

impl DeckhandError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a template error from any displayable message.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a resolution error for a stack output lookup.
    pub fn resolution(stack: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Resolution {
            stack: stack.into(),
            output: output.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }
}
