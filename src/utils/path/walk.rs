//! Directory walking.
//!
//! All walks return sorted paths so anything derived from them (copy order,
//! concatenation order) is deterministic.

use jwalk::{DirEntry, WalkDir};
use std::path::{Path, PathBuf};

/// Directories never descended into.
const PRUNED_DIRS: &[&str] = &["node_modules"];

const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Collect all files below `dir`, recursively, sorted.
///
/// Hidden files are included. `node_modules` directories are pruned at any
/// depth. A missing directory yields an empty list. Entries that cannot be
/// read are skipped; use [`try_collect_files`] when they must not be.
pub fn collect_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<_> = walker(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(is_collected)
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

/// Like [`collect_files`], but the first unreadable entry is an error.
pub fn try_collect_files(dir: &Path) -> Result<Vec<PathBuf>, jwalk::Error> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in walker(dir) {
        let entry = entry?;
        if is_collected(&entry) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn walker(dir: &Path) -> WalkDir {
    WalkDir::new(dir)
        .skip_hidden(false)
        .process_read_dir(|_depth, _path, _state, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    !(e.file_type().is_dir()
                        && PRUNED_DIRS.contains(&e.file_name().to_str().unwrap_or_default()))
                })
            });
        })
}

fn is_collected(entry: &DirEntry<((), ())>) -> bool {
    let name = entry.file_name().to_str().unwrap_or_default();
    entry.file_type().is_file() && !IGNORED_FILES.contains(&name)
}

/// Collect files below `dir` whose extension is one of `exts` (case-insensitive).
pub fn collect_with_ext(dir: &Path, exts: &[&str]) -> Vec<PathBuf> {
    collect_files(dir)
        .into_iter()
        .filter(|p| has_ext(p, exts))
        .collect()
}

/// Check a path's extension against a list (case-insensitive).
pub fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Immediate subdirectories of `dir`, sorted by name.
///
/// Symlinks pointing at directories count as directories.
pub fn list_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        // `is_dir` follows symlinks
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
