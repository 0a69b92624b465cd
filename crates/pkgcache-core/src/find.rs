use crate::error::{CoreError, CoreResult};
use crate::stats::is_file_like;
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursive basename glob over a directory tree.
///
/// Each call to [`FileFinder::iter`] starts a new walk, so one finder can be
/// consumed any number of times. Entries within a directory are visited in
/// file-name order.
#[derive(Debug, Clone)]
pub struct FileFinder {
    root: PathBuf,
    pattern: Pattern,
}

impl FileFinder {
    pub fn new(root: &Path, pattern: &str) -> CoreResult<Self> {
        let pattern = compile(pattern)?;
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self { root, pattern })
    }

    pub fn iter(&self) -> FileMatches<'_> {
        let walker = if self.root.symlink_metadata().is_ok() {
            Some(
                WalkDir::new(&self.root)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter(),
            )
        } else {
            None
        };
        FileMatches {
            walker,
            pattern: &self.pattern,
        }
    }
}

impl<'a> IntoIterator for &'a FileFinder {
    type Item = PathBuf;
    type IntoIter = FileMatches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct FileMatches<'a> {
    walker: Option<walkdir::IntoIter>,
    pattern: &'a Pattern,
}

impl Iterator for FileMatches<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let walker = self.walker.as_mut()?;
        for entry in walker.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if is_file_like(&entry) && matches_basename(entry.path(), self.pattern) {
                return Some(entry.into_path());
            }
        }
        None
    }
}

pub fn compile(pattern: &str) -> CoreResult<Pattern> {
    Pattern::new(&to_glob_syntax(pattern)).map_err(|source| CoreError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Rewrites an fnmatch-style pattern into something `glob` accepts with the
/// same meaning: runs of `*` become one `*`, and a `[` without a closing `]`
/// is a literal bracket.
fn to_glob_syntax(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while i + 1 < chars.len() && chars[i + 1] == '*' {
                    i += 1;
                }
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end;
                }
                None => out.push_str("[[]"),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `start`. A `]` directly after
/// `[` or `[!` belongs to the class.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars[j.min(chars.len())..]
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

/// Glob test against the final path segment only.
pub fn matches_basename(path: &Path, pattern: &Pattern) -> bool {
    match path.file_name() {
        Some(name) => pattern.matches(&name.to_string_lossy()),
        None => false,
    }
}

pub fn find_files(root: &Path, pattern: &str) -> CoreResult<Vec<PathBuf>> {
    Ok(FileFinder::new(root, pattern)?.iter().collect())
}
