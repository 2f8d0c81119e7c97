//! Content fingerprinting.
//!
//! A book's identity is the BLAKE3 hash of its bytes; the path is just where
//! it happens to live today. Same hash at a new path is a move, not a new
//! book.

use std::io::Read;
use std::path::Path;

/// Hash a file's contents. Synchronous; run it on a blocking thread.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_and_buffer_fingerprints_agree() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"the same bytes").unwrap();
        assert_eq!(fingerprint_file(file.path()).unwrap(), fingerprint_bytes(b"the same bytes"));
    }

    #[test]
    fn test_content_determines_identity() {
        assert_eq!(fingerprint_bytes(b"abc"), fingerprint_bytes(b"abc"));
        assert_ne!(fingerprint_bytes(b"abc"), fingerprint_bytes(b"abd"));
    }
}
