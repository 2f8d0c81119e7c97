//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Note that the format extractors themselves never surface these to a scan:
//! a file that cannot be parsed degrades to an empty [`Extraction`](crate::Extraction).
//! The errors here belong to the parsing primitives (`Isbn`, `CallNumber`)
//! and to injected text recognizers.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A candidate identifier failed checksum validation or had the wrong
    /// shape. Treated the same as "not found" by callers.
    #[display("invalid identifier: {_0}")]
    InvalidIdentifier(#[error(not(source))] String),
    /// A string does not parse as a Library of Congress call number.
    #[display("invalid call number: {_0}")]
    InvalidCallNumber(#[error(not(source))] String),
    /// An injected text recognizer failed to produce text.
    #[display("text recognition failed")]
    Recognition,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
