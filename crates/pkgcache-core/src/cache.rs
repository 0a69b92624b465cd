use crate::error::{CoreError, CoreResult};
use crate::find::{compile, matches_basename, FileFinder};
use crate::location::{cache_location, CacheType};
use crate::remove::{remove_file, remove_tree};
use crate::report::{Reporter, Status, UnitOutcome};
use crate::stats::{format_size, tree_statistics};
use std::fmt;
use std::path::{Path, PathBuf};

const WHEEL_GLOB: &str = "*.whl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    Info,
    List,
    Rm { targets: Vec<String> },
    Purge,
}

impl CacheAction {
    pub const NAMES: [&'static str; 4] = ["info", "list", "rm", "purge"];

    /// Builds an action from its name and the remaining positional arguments.
    pub fn parse<S: AsRef<str>>(name: Option<&str>, args: &[S]) -> CoreResult<Self> {
        match name {
            Some("info") => Ok(CacheAction::Info),
            Some("list") => Ok(CacheAction::List),
            Some("rm") => Ok(CacheAction::Rm {
                targets: args.iter().map(|a| a.as_ref().to_string()).collect(),
            }),
            Some("purge") => Ok(CacheAction::Purge),
            _ => Err(CoreError::usage(format!(
                "Please provide one of these subcommands: {}",
                Self::NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheAction::Info => "info",
            CacheAction::List => "list",
            CacheAction::Rm { .. } => "rm",
            CacheAction::Purge => "purge",
        }
    }
}

impl fmt::Display for CacheAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct CacheManager {
    root: PathBuf,
}

impl CacheManager {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root
    }

    pub fn location(&self, cache_type: CacheType) -> PathBuf {
        cache_location(&self.root, cache_type)
    }

    /// Runs one action. Usage errors come back as `Err` before the filesystem
    /// is touched. Per-file and per-cache I/O failures go to `reporter` and are
    /// folded into the returned [`Status`].
    pub fn run(
        &self,
        cache_type: CacheType,
        action: &CacheAction,
        mut reporter: impl Reporter,
    ) -> CoreResult<Status> {
        tracing::debug!(action = %action, cache_type = %cache_type, root = %self.root.display(), "running cache action");
        match action {
            CacheAction::Info => Ok(self.info(cache_type, &mut reporter)),
            CacheAction::List => self.list(cache_type, &mut reporter),
            CacheAction::Rm { targets } => self.rm(cache_type, targets.as_slice(), &mut reporter),
            CacheAction::Purge => Ok(self.purge(cache_type, &mut reporter)),
        }
    }

    pub fn info(&self, cache_type: CacheType, mut reporter: impl Reporter) -> Status {
        for &ty in cache_type.concrete() {
            let location = self.location(ty);
            let stats = tree_statistics(&location);
            reporter.info(&format!(
                "{} info:\n   Location: {}\n   Files: {}\n   Size: {}",
                label(ty),
                location.display(),
                stats.files,
                format_size(stats.bytes)
            ));
        }
        Status::Success
    }

    pub fn list(&self, cache_type: CacheType, mut reporter: impl Reporter) -> CoreResult<Status> {
        require_wheel(cache_type, "list")?;
        let finder = FileFinder::new(&self.location(CacheType::Wheel), WHEEL_GLOB)?;
        let mut wheels: Vec<String> = finder
            .iter()
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        wheels.sort();
        for wheel in &wheels {
            reporter.info(wheel);
        }
        Ok(Status::Success)
    }

    pub fn rm<S: AsRef<str>>(
        &self,
        cache_type: CacheType,
        targets: &[S],
        mut reporter: impl Reporter,
    ) -> CoreResult<Status> {
        require_wheel(cache_type, "rm")?;
        if targets.is_empty() {
            return Err(CoreError::usage(
                "Must specify the filename of (a) wheel(s) to remove.",
            ));
        }
        let location = self.location(CacheType::Wheel);
        let wheel_glob = compile(WHEEL_GLOB)?;

        let outcomes: Vec<UnitOutcome> = targets
            .iter()
            .flat_map(|target| {
                self.rm_target(&location, target.as_ref(), &wheel_glob, &mut reporter)
            })
            .collect();
        Ok(Status::fold(outcomes))
    }

    fn rm_target(
        &self,
        location: &Path,
        target: &str,
        wheel_glob: &glob::Pattern,
        reporter: &mut impl Reporter,
    ) -> Vec<UnitOutcome> {
        let finder = match FileFinder::new(location, target) {
            Ok(finder) => finder,
            Err(err) => {
                reporter.warn(&format!("Could not search for {}; {}", target, err));
                return vec![UnitOutcome::Failed];
            }
        };
        let matches: Vec<PathBuf> = finder
            .iter()
            .filter(|path| matches_basename(path, wheel_glob))
            .collect();
        if matches.is_empty() {
            reporter.warn(&format!("No match found for {}", target));
            return vec![UnitOutcome::Failed];
        }

        unlink_all(&matches, reporter)
    }

    pub fn purge(&self, cache_type: CacheType, mut reporter: impl Reporter) -> Status {
        let outcomes: Vec<UnitOutcome> = cache_type
            .concrete()
            .iter()
            .map(|&ty| {
                let location = self.location(ty);
                if !is_real_dir(&location) {
                    reporter.info(&format!("{} is not a directory; skipping", location.display()));
                    return UnitOutcome::Skipped;
                }
                match remove_tree(&location) {
                    Ok(()) => {
                        reporter.info(&format!("Removed {}", location.display()));
                        UnitOutcome::Done
                    }
                    Err(err) => {
                        reporter.warn(&format!("Could not remove {}; {}", location.display(), err));
                        UnitOutcome::Failed
                    }
                }
            })
            .collect();
        Status::fold(outcomes)
    }
}

/// Unlinks every path, one outcome per path. A path that vanished since it
/// was found counts as a failure like any other unlink error.
fn unlink_all(paths: &[PathBuf], reporter: &mut impl Reporter) -> Vec<UnitOutcome> {
    paths
        .iter()
        .map(|path| match remove_file(path) {
            Ok(()) => {
                reporter.info(&format!("Removed {}", path.display()));
                UnitOutcome::Done
            }
            Err(err) => {
                reporter.warn(&format!("Could not remove {}; {}", path.display(), err));
                UnitOutcome::Failed
            }
        })
        .collect()
}

fn label(cache_type: CacheType) -> &'static str {
    match cache_type {
        CacheType::Http => "HTTP cache",
        _ => "Wheel cache",
    }
}

fn require_wheel(cache_type: CacheType, action: &str) -> CoreResult<()> {
    if cache_type == CacheType::Wheel {
        Ok(())
    } else {
        Err(CoreError::usage(format!(
            "pkgcache {} only operates on the wheel cache.",
            action
        )))
    }
}

/// A directory that is not itself a symlink.
fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|meta| meta.file_type().is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Level, ReportLine};
    use std::fs;

    fn seeded() -> (tempfile::TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let wheels = dir.path().join("wheels/ab/cd");
        fs::create_dir_all(&wheels).unwrap();
        fs::write(wheels.join("foo-1.0-py3-none-any.whl"), vec![0u8; 100]).unwrap();
        fs::write(wheels.join("bar-2.0-py3-none-any.whl"), vec![0u8; 200]).unwrap();
        fs::write(wheels.join("origin.json"), b"{}").unwrap();
        fs::create_dir_all(dir.path().join("http/0/1")).unwrap();
        fs::write(dir.path().join("http/0/1/abcdef"), vec![0u8; 50]).unwrap();
        let manager = CacheManager::new(dir.path().to_path_buf());
        (dir, manager)
    }

    fn messages(lines: &[ReportLine]) -> Vec<&str> {
        lines.iter().map(|l| l.message.as_str()).collect()
    }

    #[test]
    fn parse_actions() {
        let none: [&str; 0] = [];
        assert_eq!(CacheAction::parse(Some("info"), &none).unwrap(), CacheAction::Info);
        assert_eq!(
            CacheAction::parse(Some("rm"), &["a*", "b*"]).unwrap(),
            CacheAction::Rm { targets: vec!["a*".to_string(), "b*".to_string()] }
        );
        assert!(CacheAction::parse(Some("clean"), &none).unwrap_err().is_usage());
        assert!(CacheAction::parse(None, &none).unwrap_err().is_usage());
    }

    #[test]
    fn info_reports_each_type_in_order() {
        let (_dir, manager) = seeded();
        let mut lines: Vec<ReportLine> = Vec::new();
        let status = manager.run(CacheType::All, &CacheAction::Info, &mut lines).unwrap();

        assert!(status.is_success());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].message.starts_with("HTTP cache info:"));
        assert!(lines[0].message.contains("Files: 1"));
        assert!(lines[0].message.contains("Size: 50bytes"));
        assert!(lines[1].message.starts_with("Wheel cache info:"));
        assert!(lines[1].message.contains("Files: 3"));
        assert!(lines[1].message.contains("Size: 302bytes"));
    }

    #[test]
    fn info_on_missing_root_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(dir.path().join("absent"));
        let mut lines: Vec<ReportLine> = Vec::new();
        let status = manager.run(CacheType::Wheel, &CacheAction::Info, &mut lines).unwrap();
        assert!(status.is_success());
        assert!(lines[0].message.contains("Files: 0"));
        assert!(lines[0].message.contains("Size: 0bytes"));
    }

    #[test]
    fn list_is_sorted_basenames() {
        let (_dir, manager) = seeded();
        let mut lines: Vec<ReportLine> = Vec::new();
        manager.run(CacheType::Wheel, &CacheAction::List, &mut lines).unwrap();
        assert_eq!(
            messages(&lines),
            vec!["bar-2.0-py3-none-any.whl", "foo-1.0-py3-none-any.whl"]
        );
    }

    #[test]
    fn list_and_rm_refuse_other_types() {
        let (dir, manager) = seeded();
        let mut lines: Vec<ReportLine> = Vec::new();
        for ty in [CacheType::Http, CacheType::All] {
            assert!(manager.run(ty, &CacheAction::List, &mut lines).unwrap_err().is_usage());
            let rm = CacheAction::Rm { targets: vec!["*".to_string()] };
            assert!(manager.run(ty, &rm, &mut lines).unwrap_err().is_usage());
        }
        assert!(lines.is_empty());
        assert!(dir.path().join("http/0/1/abcdef").exists());

        let err = manager.run(CacheType::Http, &CacheAction::List, &mut lines).unwrap_err();
        assert_eq!(err.to_string(), "pkgcache list only operates on the wheel cache.");
    }

    #[test]
    fn rm_without_targets_is_usage_error() {
        let (_dir, manager) = seeded();
        let err = manager
            .run(CacheType::Wheel, &CacheAction::Rm { targets: Vec::new() }, Vec::<ReportLine>::new())
            .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn rm_keeps_going_after_a_miss() {
        let (dir, manager) = seeded();
        let mut lines: Vec<ReportLine> = Vec::new();
        let action = CacheAction::Rm {
            targets: vec!["nothing*".to_string(), "foo*".to_string()],
        };
        let status = manager.run(CacheType::Wheel, &action, &mut lines).unwrap();

        assert_eq!(status, Status::Failure);
        assert_eq!(lines[0].level, Level::Warn);
        assert_eq!(lines[0].message, "No match found for nothing*");
        assert_eq!(lines[1].level, Level::Info);
        assert!(lines[1].message.starts_with("Removed "));
        let wheels = dir.path().join("wheels/ab/cd");
        assert!(!wheels.join("foo-1.0-py3-none-any.whl").exists());
        assert!(wheels.join("bar-2.0-py3-none-any.whl").exists());
    }

    #[test]
    fn rm_only_touches_wheels() {
        let (dir, manager) = seeded();
        let mut lines: Vec<ReportLine> = Vec::new();
        let action = CacheAction::Rm { targets: vec!["*.json".to_string()] };
        let status = manager.run(CacheType::Wheel, &action, &mut lines).unwrap();

        assert_eq!(status, Status::Failure);
        assert_eq!(messages(&lines), vec!["No match found for *.json"]);
        assert!(dir.path().join("wheels/ab/cd/origin.json").exists());
    }

    #[test]
    fn rm_accepts_fnmatch_only_patterns() {
        let (dir, manager) = seeded();
        let wheels = dir.path().join("wheels/ab/cd");
        fs::write(wheels.join("[baz-3.0-py3-none-any.whl"), b"").unwrap();
        let mut lines: Vec<ReportLine> = Vec::new();
        let action = CacheAction::Rm {
            targets: vec!["foo**".to_string(), "[baz*".to_string()],
        };
        let status = manager.run(CacheType::Wheel, &action, &mut lines).unwrap();

        assert_eq!(status, Status::Success);
        assert!(lines.iter().all(|l| l.level == Level::Info));
        assert!(!wheels.join("foo-1.0-py3-none-any.whl").exists());
        assert!(!wheels.join("[baz-3.0-py3-none-any.whl").exists());
        assert!(wheels.join("bar-2.0-py3-none-any.whl").exists());
    }

    /// Makes `dir` read-only. Returns false when the process can still write
    /// into it (running as root), in which case the caller should bail out.
    #[cfg(unix)]
    fn lock_dir(dir: &Path, mode: u32) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(mode)).unwrap();
        let canary = dir.join(".canary");
        if fs::write(&canary, b"").is_ok() {
            let _ = fs::remove_file(&canary);
            fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn unlock_dir(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o755));
    }

    #[cfg(unix)]
    #[test]
    fn rm_reports_unlink_failure_and_keeps_going() {
        let (dir, manager) = seeded();
        let pinned = dir.path().join("wheels/pinned");
        fs::create_dir_all(&pinned).unwrap();
        fs::write(pinned.join("foo-0.9-py3-none-any.whl"), b"").unwrap();
        if !lock_dir(&pinned, 0o555) {
            return;
        }

        let mut lines: Vec<ReportLine> = Vec::new();
        let action = CacheAction::Rm {
            targets: vec!["foo*".to_string(), "bar*".to_string()],
        };
        let status = manager.run(CacheType::Wheel, &action, &mut lines).unwrap();
        unlock_dir(&pinned);

        assert_eq!(status, Status::Failure);
        let failed: Vec<_> = lines.iter().filter(|l| l.level == Level::Warn).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].message.starts_with("Could not remove "));
        assert!(failed[0].message.contains("foo-0.9-py3-none-any.whl"));
        assert!(pinned.join("foo-0.9-py3-none-any.whl").exists());
        assert!(!dir.path().join("wheels/ab/cd/foo-1.0-py3-none-any.whl").exists());
        assert!(!dir.path().join("wheels/ab/cd/bar-2.0-py3-none-any.whl").exists());
    }

    #[test]
    fn rm_reports_file_gone_before_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let wheels = dir.path().join("wheels");
        fs::create_dir_all(&wheels).unwrap();
        let mut lines: Vec<ReportLine> = Vec::new();

        let vanished = wheels.join("gone-1.0-py3-none-any.whl");
        let outcomes = unlink_all(&[vanished], &mut lines);

        assert_eq!(outcomes, vec![UnitOutcome::Failed]);
        assert_eq!(Status::fold(outcomes), Status::Failure);
        assert_eq!(lines[0].level, Level::Warn);
        assert!(lines[0].message.starts_with("Could not remove "));
    }

    #[test]
    fn purge_skips_missing_directory_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(dir.path().to_path_buf());
        let mut lines: Vec<ReportLine> = Vec::new();
        let status = manager.run(CacheType::Http, &CacheAction::Purge, &mut lines).unwrap();

        assert!(status.is_success());
        assert_eq!(lines[0].level, Level::Info);
        assert!(lines[0].message.ends_with("is not a directory; skipping"));
    }

    #[cfg(unix)]
    #[test]
    fn purge_does_not_follow_symlinked_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("keep.whl"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("wheels")).unwrap();

        let manager = CacheManager::new(dir.path().to_path_buf());
        let mut lines: Vec<ReportLine> = Vec::new();
        let status = manager.run(CacheType::Wheel, &CacheAction::Purge, &mut lines).unwrap();

        assert!(status.is_success());
        assert!(lines[0].message.ends_with("is not a directory; skipping"));
        assert!(outside.path().join("keep.whl").exists());
    }

    #[cfg(unix)]
    #[test]
    fn purge_all_continues_after_http_failure() {
        let (dir, manager) = seeded();
        let http = dir.path().join("http");
        if !lock_dir(&http, 0o000) {
            return;
        }

        let mut lines: Vec<ReportLine> = Vec::new();
        let status = manager.run(CacheType::All, &CacheAction::Purge, &mut lines).unwrap();
        unlock_dir(&http);

        assert_eq!(status, Status::Failure);
        assert_eq!(lines[0].level, Level::Warn);
        assert!(lines[0].message.starts_with(&format!("Could not remove {}", http.display())));
        assert_eq!(lines[1].level, Level::Info);
        assert_eq!(lines[1].message, format!("Removed {}", dir.path().join("wheels").display()));
        assert!(http.exists());
        assert!(!dir.path().join("wheels").exists());
    }

    #[test]
    fn purge_wheel_leaves_http_alone() {
        let (dir, manager) = seeded();
        let mut lines: Vec<ReportLine> = Vec::new();
        let status = manager.run(CacheType::Wheel, &CacheAction::Purge, &mut lines).unwrap();

        assert!(status.is_success());
        assert!(!dir.path().join("wheels").exists());
        assert!(dir.path().join("http/0/1/abcdef").exists());
    }
}
