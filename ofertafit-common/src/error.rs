//! Shared error types for the ofertafit engine
//!
//! Expected marketplace transport outcomes are not errors and never appear
//! here; they are modeled as `FetchOutcome` in the sync service. This enum
//! covers the genuinely unexpected: storage, I/O, configuration and wiring
//! failures.

use thiserror::Error;

/// Result type for ofertafit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across the ofertafit services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A tracked item names a marketplace with no registered provider
    #[error("No provider registered for marketplace: {0}")]
    UnknownMarketplace(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
