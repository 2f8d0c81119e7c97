//! SQLite catalog database for book records.
//!
//! The catalog is the authority for a personal library: one row per book,
//! tracking where the file lives, what the book is, and how much of that
//! identification a human has vouched for. Match state and manual edits are
//! the precious part - file facts can always be rebuilt by re-scanning.
//!
//! # Architecture
//! - **BookRecord**: one catalogued book, file-backed or physical-only.
//!   Content identity is a BLAKE3 hash of the file bytes; paths are
//!   locations, not identity.
//! - **Match state machine**: `MatchStatus` x `Confidence`, enforced in the
//!   repository's guarded UPDATE statements.
//! - **CacheStore**: (source, key) -> payload with read-time TTL, backing
//!   the resolution cascade's cache-first discipline.

mod db;
pub mod error;
mod models;
mod repo;
mod status;

pub use crate::db::Database;
pub use crate::models::{BookEdit, BookRecord, MatchCandidate, NewBook};
pub use crate::repo::{BookFilter, BookRepository, CacheAnswer, CacheStore, SortOrder};
pub use crate::status::{Confidence, MatchStatus};
