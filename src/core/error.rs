//! Error types for butterfly-walk
//!
//! Cache failures never show up here: the distance store absorbs them at its
//! boundary. What remains are the conditions a caller has to act on.

use thiserror::Error;

use crate::core::coords::CoordinatePair;

/// Main error type for butterfly-walk operations
#[derive(Debug, Error)]
pub enum Error {
    /// Resolver built without any source of distances, or similar misuse
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Neither the cache nor the routing engine produced a value.
    /// `index` is the position in the batch, `None` for a single-pair call.
    #[error("Unresolvable pair{}: {pair}", batch_position(.index))]
    UnresolvablePair {
        index: Option<usize>,
        pair: CoordinatePair,
    },

    /// Routing engine could not be prepared
    #[error("Routing engine setup failed: {0}")]
    EngineSetup(String),

    /// SQLite failure outside the advisory cache (e.g. the GTFS database)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP-specific error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network connectivity issues
    #[error("Network error: {0}")]
    NetworkError(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::NetworkError(err.to_string())
        } else {
            Error::HttpError(err.to_string())
        }
    }
}

fn batch_position(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" #{i}"),
        None => String::new(),
    }
}

/// Convenience result type for butterfly-walk operations
pub type Result<T> = std::result::Result<T, Error>;
