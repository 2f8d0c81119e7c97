mod book;

pub use book::{BookEdit, BookRecord, MatchCandidate, NewBook};
pub(crate) use book::{BookRow, path_to_string};
