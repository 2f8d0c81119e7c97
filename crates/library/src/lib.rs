//! Library scanning: reconciling the files on disk with the catalog.
//!
//! The catalog is the authority; the filesystem is just evidence. A scan
//! walks the library root, works out which catalog records the evidence
//! supports (new files, moved files, changed files, vanished files), and
//! then lets the resolution cascade identify whatever is still anonymous.

pub mod error;
pub mod hash;
pub mod locks;
pub mod progress;
pub mod scan;
pub mod walk;

pub use error::{Error, ErrorKind, Result};
pub use progress::{Phase, ProgressSnapshot, ScanProgress};
pub use scan::{
    CleanupSummary, EnrichSummary, FileOutcome, IndexSummary, ScanEvent, ScanSummary, Scanner,
};
pub use walk::{WalkedFile, walk_library};
