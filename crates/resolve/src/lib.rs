//! Metadata and classification resolution against external book sources.
//!
//! Everything here obeys three laws:
//! 1. **Cache first.** A fresh cached answer (including a confirmed empty
//!    one) means no network traffic at all.
//! 2. **Failures degrade.** A source being down, slow, or nonsensical is a
//!    logged no-result; the cascade carries on and nothing is negatively
//!    cached.
//! 3. **No writes.** Resolution produces candidates; applying them to the
//!    catalog is the caller's decision, under the match state machine.

mod cascade;
mod client;
pub mod error;
mod googlebooks;
mod limit;
mod loc;
mod oclc;
mod openlibrary;
mod source;
mod subjects;

pub use crate::cascade::Resolver;
pub use crate::client::SourceClient;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::limit::RateGate;
pub use crate::source::MetadataSource;
pub use crate::subjects::clean_subjects;
