//! Publishing into the runtime's external-modules directory.
//!
//! A published unit lives in `<external>/<ens-name>/`:
//!
//! ```text
//! <external>/sampledapp/
//! ├── dbcp.json          # copied descriptor
//! ├── sampledapp.js.map  # from dist/<name>.js.map, when produced
//! ├── <dapp.files>       # from dist, falling back to src
//! └── dbcpPath.json      # {"dbcpPath": "<unit root>/dbcp.json"}
//! ```

use crate::pipeline::{Outcome, StageError};
use crate::unit::{BuildUnit, DESCRIPTOR_FILE};
use crate::{debug, log, stager};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Sidecar pointing the runtime at the original descriptor.
pub const SIDECAR_FILE: &str = "dbcpPath.json";

#[derive(Serialize)]
struct Sidecar<'a> {
    #[serde(rename = "dbcpPath")]
    dbcp_path: &'a Path,
}

/// Copy a built unit into `<external_root>/<ens-name>/`.
///
/// Skipped when the descriptor declares no files. The target folder is
/// emptied first. Declared files missing from both dist and src are
/// ignored.
pub fn publish_unit(unit: &BuildUnit, external_root: &Path) -> Result<Outcome, StageError> {
    if unit.files.is_empty() {
        return Ok(Outcome::Skipped("descriptor lists no files".into()));
    }

    let ens = unit.ens_name();
    let dest = external_root.join(&ens);
    fs::create_dir_all(&dest).map_err(StageError::io(&dest))?;
    stager::clear_contents(&dest);

    copy_file(&unit.descriptor_path(), &dest.join(DESCRIPTOR_FILE))?;

    for file in &unit.files {
        let Some(source) = [unit.dist.join(file), unit.src.join(file)]
            .into_iter()
            .find(|p| p.is_file())
        else {
            debug!("publish"; "{} not found, skipped", file);
            continue;
        };
        copy_file(&source, &dest.join(file))?;
    }
    publish_map(unit, &dest)?;

    write_sidecar(&dest, &unit.descriptor_path())?;
    log!("publish"; "{} -> {}", unit.name, dest.display());
    Ok(Outcome::Succeeded)
}

/// Copy `dist/<name>.js.map` as `<ens-name>.js.map`.
///
/// The bundle's `sourceMappingURL` names `<name>.js.map`, so a hyphenated
/// unit also gets a copy under that name.
fn publish_map(unit: &BuildUnit, dest: &Path) -> Result<(), StageError> {
    let map_name = format!("{}.js.map", unit.name);
    let source = unit.dist.join(&map_name);
    if !source.is_file() {
        debug!("publish"; "{} not found, skipped", map_name);
        return Ok(());
    }
    let ens_map = format!("{}.js.map", unit.ens_name());
    copy_file(&source, &dest.join(&ens_map))?;
    if ens_map != map_name {
        copy_file(&source, &dest.join(&map_name))?;
    }
    Ok(())
}

/// Copy sub-build outputs into `dest`.
///
/// Files are copied by name. A directory's contents are merged into
/// `dest`, keeping their relative paths.
pub fn publish_files(cwd: &Path, files: &[PathBuf], dest: &Path) -> Result<usize, StageError> {
    fs::create_dir_all(dest).map_err(StageError::io(dest))?;

    let mut copied = 0;
    for entry in files {
        let source = cwd.join(entry);
        if source.is_dir() {
            copied += stager::promote(&source, dest, None)?;
        } else if source.is_file() {
            let Some(name) = source.file_name() else {
                continue;
            };
            copy_file(&source, &dest.join(name))?;
            copied += 1;
        } else {
            debug!("publish"; "{} not found, skipped", source.display());
        }
    }
    Ok(copied)
}

/// Write `dbcpPath.json` into `dir`.
pub fn write_sidecar(dir: &Path, descriptor: &Path) -> Result<(), StageError> {
    let path = dir.join(SIDECAR_FILE);
    let json = serde_json::to_string(&Sidecar {
        dbcp_path: descriptor,
    })
    .unwrap_or_default();
    fs::write(&path, json).map_err(StageError::io(&path))
}

fn copy_file(from: &Path, to: &Path) -> Result<(), StageError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(StageError::io(parent))?;
    }
    fs::copy(from, to).map_err(StageError::io(from))?;
    Ok(())
}
