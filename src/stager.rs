//! Directory staging.
//!
//! Moves files between the working directories of a build unit. Copies
//! abort on the first failure; deletions are best-effort and only logged.

use crate::pipeline::StageError;
use crate::unit::BuildUnit;
use crate::utils::path::{try_collect_files, walk::has_ext};
use crate::{debug, log};
use rayon::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Image types copied from `src` into `dist`.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "svg", "jpeg", "gif"];

/// Copy the unit's `src` tree into `.tmp`, skipping `node_modules`.
pub fn stage(unit: &BuildUnit) -> Result<usize, StageError> {
    if !unit.src.is_dir() {
        return Err(StageError::Io(
            unit.src.clone(),
            io::Error::new(io::ErrorKind::NotFound, "source directory does not exist"),
        ));
    }
    copy_tree(&unit.src, &unit.tmp, |_| true)
}

/// Copy every file of `from` into `to`, optionally skipping one extension.
pub fn promote(from: &Path, to: &Path, exclude_ext: Option<&str>) -> Result<usize, StageError> {
    copy_tree(from, to, |path| {
        exclude_ext.is_none_or(|ext| !has_ext(path, &[ext]))
    })
}

/// Copy files of `from` with one of `exts` into `to`, keeping relative paths.
pub fn copy_matching(from: &Path, to: &Path, exts: &[&str]) -> Result<usize, StageError> {
    copy_tree(from, to, |path| has_ext(path, exts))
}

/// Force-delete directories. Missing ones are fine; other failures are logged.
pub fn clean(paths: &[&Path]) {
    for path in paths {
        match fs::remove_dir_all(path) {
            Ok(()) => debug!("clean"; "removed {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log!("clean"; "could not remove {}: {}", path.display(), err),
        }
    }
}

/// Delete everything inside `dir` but keep the directory itself.
///
/// The directory is created when missing.
pub fn clear_contents(dir: &Path) {
    if let Err(err) = fs::create_dir_all(dir) {
        log!("clean"; "could not create {}: {}", dir.display(), err);
        return;
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log!("clean"; "could not read {}: {}", dir.display(), err);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path),
            _ => fs::remove_file(&path),
        };
        if let Err(err) = result {
            log!("clean"; "could not remove {}: {}", path.display(), err);
        }
    }
}

/// Copy a filtered tree in parallel. Returns the number of files copied.
fn copy_tree(
    from: &Path,
    to: &Path,
    keep: impl Fn(&Path) -> bool + Sync,
) -> Result<usize, StageError> {
    let files: Vec<PathBuf> = try_collect_files(from)
        .map_err(|err| StageError::Io(from.to_path_buf(), io::Error::other(err.to_string())))?
        .into_iter()
        .filter(|p| keep(p))
        .collect();

    fs::create_dir_all(to).map_err(StageError::io(to))?;

    files.par_iter().try_for_each(|file| {
        let Ok(rel) = file.strip_prefix(from) else {
            return Ok(());
        };
        let dest = to.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(StageError::io(parent))?;
        }
        fs::copy(file, &dest).map_err(StageError::io(file))?;
        Ok::<_, StageError>(())
    })?;

    debug!("copy"; "{} files {} -> {}", files.len(), from.display(), to.display());
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::test_unit;
    use tempfile::TempDir;

    #[test]
    fn test_stage_copies_source_without_node_modules() {
        let dir = TempDir::new().unwrap();
        let unit = test_unit(dir.path(), "sample");
        fs::create_dir_all(unit.src.join("components/node_modules/dep")).unwrap();
        fs::write(unit.src.join("index.ts"), "export const a = 1;").unwrap();
        fs::write(unit.src.join("components/list.ts"), "").unwrap();
        fs::write(unit.src.join("components/node_modules/dep/index.js"), "").unwrap();

        let copied = stage(&unit).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(unit.tmp.join("index.ts")).unwrap(),
            "export const a = 1;"
        );
        assert!(unit.tmp.join("components/list.ts").exists());
        assert!(!unit.tmp.join("components/node_modules").exists());
    }

    #[test]
    fn test_stage_missing_src() {
        let dir = TempDir::new().unwrap();
        let unit = test_unit(dir.path(), "sample");
        fs::remove_dir_all(&unit.src).unwrap();
        assert!(matches!(stage(&unit), Err(StageError::Io(..))));
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_unreadable_subtree_fails() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let unit = test_unit(dir.path(), "sample");
        let locked = unit.src.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("view.ts"), "").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let readable = fs::read_dir(&locked).is_ok();

        let result = stage(&unit);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            assert_eq!(result.unwrap(), 1);
        } else {
            assert!(matches!(result, Err(StageError::Io(..))));
        }
    }

    #[test]
    fn test_promote_excludes_extension() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("build");
        let to = dir.path().join("dist");
        fs::create_dir_all(from.join("sub")).unwrap();
        fs::write(from.join("index.js"), "").unwrap();
        fs::write(from.join("index.d.ts"), "").unwrap();
        fs::write(from.join("sub/index.js.map"), "").unwrap();

        promote(&from, &to, Some("js")).unwrap();

        assert!(!to.join("index.js").exists());
        assert!(to.join("index.d.ts").exists());
        assert!(to.join("sub/index.js.map").exists());
    }

    #[test]
    fn test_copy_matching_images() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("src");
        let to = dir.path().join("dist");
        fs::create_dir_all(from.join("assets")).unwrap();
        fs::write(from.join("assets/logo.svg"), "<svg/>").unwrap();
        fs::write(from.join("main.ts"), "").unwrap();

        assert_eq!(copy_matching(&from, &to, IMAGE_EXTENSIONS).unwrap(), 1);
        assert!(to.join("assets/logo.svg").exists());
        assert!(!to.join("main.ts").exists());
    }

    #[test]
    fn test_clean_never_fails() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("build");
        fs::create_dir_all(existing.join("nested")).unwrap();
        let missing = dir.path().join("missing");

        clean(&[&existing, &missing]);

        assert!(!existing.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_clear_contents_keeps_inode() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        fs::create_dir_all(dist.join("assets")).unwrap();
        fs::write(dist.join("old.js"), "stale").unwrap();
        let inode = fs::metadata(&dist).unwrap().ino();

        clear_contents(&dist);

        assert_eq!(fs::metadata(&dist).unwrap().ino(), inode);
        assert_eq!(fs::read_dir(&dist).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_contents_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        clear_contents(&dist);
        assert!(dist.is_dir());
    }
}
