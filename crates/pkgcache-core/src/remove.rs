use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

const RETRY_BUDGET: Duration = Duration::from_secs(3);
const RETRY_INTERVAL: Duration = Duration::from_millis(500);

pub fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Recursively deletes `path`, clearing read-only bits and retrying for a few
/// seconds before giving up with the last error.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    remove_tree_with(path, RETRY_BUDGET, RETRY_INTERVAL)
}

fn remove_tree_with(path: &Path, budget: Duration, interval: Duration) -> io::Result<()> {
    let started = Instant::now();
    loop {
        let err = match remove_once(path) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if err.kind() == io::ErrorKind::NotFound || started.elapsed() + interval > budget {
            return Err(err);
        }
        tracing::debug!(path = %path.display(), error = %err, "remove failed, retrying");
        thread::sleep(interval);
    }
}

fn remove_once(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            clear_readonly(path);
            fs::remove_dir_all(path)
        }
        Err(err) => Err(err),
    }
}

fn clear_readonly(path: &Path) {
    for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
        if entry.path_is_symlink() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if let Some(perms) = owner_writable(meta.permissions()) {
            if let Err(err) = fs::set_permissions(entry.path(), perms) {
                tracing::debug!(path = %entry.path().display(), error = %err, "chmod failed");
            }
        }
    }
}

/// Permissions with the owner write bit added, or `None` if it is already set.
#[cfg(unix)]
fn owner_writable(perms: fs::Permissions) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = perms.mode() & 0o7777;
    if mode & 0o200 != 0 {
        return None;
    }
    Some(fs::Permissions::from_mode(mode | 0o200))
}

#[cfg(not(unix))]
fn owner_writable(mut perms: fs::Permissions) -> Option<fs::Permissions> {
    if !perms.readonly() {
        return None;
    }
    perms.set_readonly(false);
    Some(perms)
}
