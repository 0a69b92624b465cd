use std::path::Path;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub files: u64,
    pub bytes: u64,
}

/// Counts file-like entries under `path` and sums their own (lstat) sizes.
///
/// A missing `path` is an empty tree. Entries that cannot be read are skipped,
/// so the result may undercount on permission errors or concurrent deletes.
pub fn tree_statistics(path: &Path) -> TreeStats {
    let mut stats = TreeStats::default();
    if path.symlink_metadata().is_err() {
        return stats;
    }

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !is_file_like(&entry) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => {
                stats.files += 1;
                stats.bytes += meta.len();
            }
            Err(err) => {
                tracing::debug!(path = %entry.path().display(), error = %err, "stat failed");
            }
        }
    }
    stats
}

/// Regular files, plus symlinks that do not lead to a directory.
pub(crate) fn is_file_like(entry: &DirEntry) -> bool {
    let ty = entry.file_type();
    if ty.is_file() {
        return true;
    }
    ty.is_symlink() && !entry.path().is_dir()
}

/// Human-readable decimal size, e.g. `1.5MB`, `42kB`, `812bytes`.
pub fn format_size(bytes: u64) -> String {
    if bytes > 1000 * 1000 {
        format!("{:.1}MB", bytes as f64 / 1000.0 / 1000.0)
    } else if bytes > 10 * 1000 {
        format!("{}kB", bytes / 1000)
    } else if bytes > 1000 {
        format!("{:.1}kB", bytes as f64 / 1000.0)
    } else {
        format!("{}bytes", bytes)
    }
}
