//! Resolution Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A resolution error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// The cascade treats every one of these as "this source had no answer" and
/// moves on; none of them is fatal to a scan.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Transport-level failure (connection, timeout, TLS). Deliberately NOT
    /// cached as an empty result, so the next pass retries.
    #[display("source unreachable: {_0}")]
    Http(#[error(not(source))] String),
    /// The source answered with something we can't make sense of.
    #[display("malformed payload from {_0}")]
    MalformedPayload(#[error(not(source))] &'static str),
    /// The cache store itself failed.
    #[display("cache store error")]
    Cache,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Cache)
    }
}
