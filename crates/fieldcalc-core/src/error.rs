//! Error types for fieldcalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling a field catalog
#[derive(Debug, Error)]
pub enum Error {
    /// Two fields share a name (names compare case-insensitively)
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// Field name is empty or whitespace
    #[error("Field name must not be empty")]
    EmptyFieldName,

    /// Field not found by name
    #[error("Field not found: {0}")]
    UnknownField(String),
}
