// src/filesystem/path.rs

//! Path comparison and sanitization utilities
//!
//! Ownership decisions in the inventory are made by comparing directories
//! lexically: `/opt/foo` owns `/opt/foo/bin` but not `/opt/foobar`. On
//! Windows the comparison is case-insensitive, as the filesystem is.
//!
//! Paths coming from package manifests are untrusted and go through
//! [`sanitize_path`] / [`safe_join`] before anything is written.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize a path from an untrusted source
///
/// This function:
/// 1. Rejects paths containing `..` (parent directory) components
/// 2. Skips `.` (current directory) components
/// 3. Strips leading slashes to make the path relative
/// 4. Returns an error for empty paths
///
/// # Examples
///
/// ```
/// use conary_inventory::filesystem::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("/.conary/uninstall.sh").unwrap(), PathBuf::from(".conary/uninstall.sh"));
/// assert!(sanitize_path("../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    // Manifests written on Windows use backslashes
    let unified = path_str.replace('\\', "/");
    let relative = unified.trim_start_matches('/');

    let mut normalized = PathBuf::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path_str.to_string()));
            }
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath("Empty path after sanitization".to_string()));
    }

    Ok(normalized)
}

/// Safely join a root path with an untrusted path
///
/// The path is sanitized first; if both sides exist on disk, the
/// canonical result must still be under the canonical root.
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let sanitized = sanitize_path(path.as_ref())?;
    let joined = root.join(&sanitized);

    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Lexical components of a path in comparable form
fn comparable(path: &Path) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            other => {
                let s = other.as_os_str().to_string_lossy();
                if cfg!(windows) {
                    parts.push(s.to_lowercase());
                } else {
                    parts.push(s.into_owned());
                }
            }
        }
    }
    parts
}

/// Lexically normalize a path: drop `.` components, resolve `..`
/// and trailing separators
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether two paths name the same location
pub fn path_equals(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    let a = comparable(a.as_ref());
    !a.is_empty() && a == comparable(b.as_ref())
}

/// Whether `child` is strictly below `parent`
pub fn is_under(child: impl AsRef<Path>, parent: impl AsRef<Path>) -> bool {
    let child = comparable(child.as_ref());
    let parent = comparable(parent.as_ref());
    !parent.is_empty() && child.len() > parent.len() && child.starts_with(&parent)
}

/// Whether `child` is `parent` or below it
pub fn is_under_or_equals(child: impl AsRef<Path>, parent: impl AsRef<Path>) -> bool {
    let child = comparable(child.as_ref());
    let parent = comparable(parent.as_ref());
    !parent.is_empty() && child.len() >= parent.len() && child.starts_with(&parent)
}

/// Number of lexical components, used to prefer the most specific owner
pub fn depth(path: impl AsRef<Path>) -> usize {
    comparable(path.as_ref()).len()
}

/// Turn a display title into a single valid path segment
///
/// Characters that are invalid in file names on any supported platform
/// (and control characters) are replaced with `replacement`. Leading and
/// trailing dots and spaces are trimmed; an empty result becomes `_`.
pub fn make_valid_filename(name: &str, replacement: char) -> String {
    const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID.contains(&c) || c.is_control() {
                replacement
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Find a path that does not exist yet, starting with `start` and
/// appending `_2`, `_3`, ... until a free name is found
pub fn find_non_existing_path(start: impl AsRef<Path>) -> PathBuf {
    let start = start.as_ref();
    if !start.exists() {
        return start.to_path_buf();
    }

    let base = start.as_os_str().to_string_lossy().into_owned();
    let mut n = 2u32;
    loop {
        let candidate = PathBuf::from(format!("{}_{}", base, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
