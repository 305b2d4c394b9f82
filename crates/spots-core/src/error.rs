//! Error types for the spots API.

use thiserror::Error;

/// Result type alias using the spots Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for spot store and query operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Spot not found
    #[error("Spot not found: {0}")]
    SpotNotFound(i32),

    /// Malformed or unsupported geometry supplied by a client.
    ///
    /// The message is shown to the client verbatim.
    #[error("{0}")]
    InvalidGeometry(String),

    /// Write conflicts with an existing record (e.g. duplicate public_id)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
