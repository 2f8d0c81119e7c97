//! Filesystem discovery.

use shelfmark_extract::Format;
use std::path::{Path, PathBuf};

/// A recognized book file found on disk, cheap facts only.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub format: Format,
    pub size: u64,
    pub mtime: i64,
}

/// Walk a library tree collecting recognized book files. Dotted directories
/// and files are skipped; unrecognized extensions are ignored silently.
/// Synchronous on purpose; callers run it on a blocking thread.
pub fn walk_library(root: &Path) -> std::io::Result<Vec<WalkedFile>> {
    let mut found = Vec::new();
    walk_dir(root, &mut found)?;
    // Deterministic order keeps scans reproducible regardless of readdir.
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

fn walk_dir(dir: &Path, found: &mut Vec<WalkedFile>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(&path, found)?;
        } else if file_type.is_file()
            && let Some(format) = format_of(&path)
        {
            let meta = entry.metadata()?;
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();
            found.push(WalkedFile { path, format, size: meta.len(), mtime });
        }
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Format::from_extension(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_skips_hidden_and_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("fiction")).unwrap();
        std::fs::create_dir(root.join(".git")).unwrap();
        std::fs::write(root.join("fiction/novel.epub"), b"x").unwrap();
        std::fs::write(root.join("fiction/notes.txt"), b"x").unwrap();
        std::fs::write(root.join(".hidden.epub"), b"x").unwrap();
        std::fs::write(root.join(".git/blob.pdf"), b"x").unwrap();
        std::fs::write(root.join("scan.PDF"), b"x").unwrap();

        let found = walk_library(root).unwrap();
        let names: Vec<_> =
            found.iter().map(|f| f.path.strip_prefix(root).unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["fiction/novel.epub", "scan.PDF"]);
        assert_eq!(found[1].format, Format::Pdf);
    }
}
