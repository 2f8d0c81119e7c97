mod books;
mod cache;

pub use books::{BookFilter, BookRepository, SortOrder};
pub use cache::{CacheAnswer, CacheStore};
