//! Error types for booth_library

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for booth_library operations
#[derive(Debug, Error)]
pub enum LibraryError {
    /// File I/O failed (reading folders, writing the catalog index)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to (de)serialize JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Change-detection database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Refused to contact a host outside the public shop pages
    #[error("Refusing to access non-public host: {0}")]
    ProhibitedHost(String),
    /// URL could not be parsed or is not http(s)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Library root does not exist or is not a directory
    #[error("Library root not found: {}", .0.display())]
    RootNotFound(PathBuf),
    /// No usable library root has been remembered yet
    #[error("Last library root is not set or does not exist")]
    NoLastRoot,
}

/// Result alias for booth_library operations
pub type Result<T> = std::result::Result<T, LibraryError>;
