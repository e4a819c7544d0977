//! Media directory scanner for the compression dispatcher.
//!
//! Walks the media tree collecting video files by extension. Any directory
//! literally named `backup` is pruned from the walk — those hold pristine
//! originals and must never be fed back into the encoder.

use std::path::{Path, PathBuf};

/// Directory name used for pristine-original copies, both by the scanner
/// (pruned) and by the compression jobs (backup target).
pub const BACKUP_DIR_NAME: &str = "backup";

/// Recursively collect files under `dir` with the given extension
/// (case-insensitive, no leading dot), skipping `backup` subtrees.
/// Results are sorted for deterministic job ordering.
pub fn scan_video_files(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(dir, extension, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if is_backup_dir(&path) {
                continue;
            }
            // Unreadable subdirectories are skipped, not fatal
            if let Err(e) = walk(&path, extension, out) {
                log::warn!("skipping unreadable directory {}: {e}", path.display());
            }
        } else if path.is_file() && has_extension(&path, extension) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_backup_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == BACKUP_DIR_NAME)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// True if any segment of the path is the backup directory name. Used by
/// compression jobs as a final guard against re-encoding a backup copy.
pub fn in_backup_dir(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_str() == Some(BACKUP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_backup_dir() {
        assert!(in_backup_dir(Path::new("media/videos/backup/clip.mp4")));
        assert!(!in_backup_dir(Path::new("media/videos/clip.mp4")));
        // Only a whole segment counts, not a substring
        assert!(!in_backup_dir(Path::new("media/backups/clip.mp4")));
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("a/clip.MP4"), "mp4"));
        assert!(has_extension(Path::new("a/clip.mp4"), "mp4"));
        assert!(!has_extension(Path::new("a/clip.png"), "mp4"));
        assert!(!has_extension(Path::new("a/clip"), "mp4"));
    }
}
