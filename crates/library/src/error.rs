//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Everything here aborts a scan; per-file trouble never becomes an error,
/// it degrades to a warning and the file waits for the next scan.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The scan root doesn't exist or can't be read. Fatal to the scan.
    #[display("library root inaccessible: {}", _0.display())]
    RootInaccessible(#[error(not(source))] PathBuf),
    /// The catalog database is unreachable. Fatal to the scan.
    #[display("catalog datastore unreachable")]
    Datastore,
    /// A blocking worker disappeared.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Datastore)
    }
}
