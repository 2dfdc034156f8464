//! Bundle stage.
//!
//! `build/index.js` → bundler → patch table → source map extraction →
//! custom `src/**/*.js` appended → `dist/<name>.js`.
//!
//! The bundle is a standalone module exposing the global `<name>`, with
//! every module on the external allow-list left for the runtime to supply.
//! An inline source map emitted by the bundler is moved to
//! `dist/<name>.js.map`.

use super::{Bundler, Externals};
use crate::patch::PatchTable;
use crate::pipeline::{Outcome, StageError};
use crate::unit::BuildUnit;
use crate::utils::path::walk::collect_with_ext;
use crate::{debug, log};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fs;

const INLINE_MAP_PREFIX: &str = "//# sourceMappingURL=data:application/json;";

/// Run the bundle stage.
pub fn run(
    unit: &BuildUnit,
    bundler: &dyn Bundler,
    patches: &PatchTable,
) -> Result<Outcome, StageError> {
    let entry = unit.build.join("index.js");
    if !entry.is_file() {
        log!("bundle"; "index.js not found, nothing to bundle");
        return Ok(Outcome::Skipped("no build/index.js".into()));
    }

    let externals = Externals::for_unit(unit);
    debug!("bundle"; "{} as `{}`, {} externals", entry.display(), unit.name, externals.len());

    let bundle = bundler.bundle(&entry, &unit.name, &externals)?;
    let patched = patches.apply(&bundle);

    fs::create_dir_all(&unit.dist).map_err(StageError::io(&unit.dist))?;

    let map_name = format!("{}.js.map", unit.name);
    let mut text = match split_inline_map(&patched) {
        Some((code, map)) => {
            let map_path = unit.dist.join(&map_name);
            fs::write(&map_path, map).map_err(StageError::io(&map_path))?;
            format!("{code}//# sourceMappingURL={map_name}\n")
        }
        None => patched,
    };

    for custom in collect_with_ext(&unit.src, &["js"]) {
        let content = fs::read_to_string(&custom).map_err(StageError::io(&custom))?;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&content);
    }

    let target = unit.bundle_path();
    fs::write(&target, text).map_err(StageError::io(&target))?;
    Ok(Outcome::Succeeded)
}

/// Split a trailing base64 inline source map off the bundle.
///
/// Returns the code before the comment and the decoded map.
fn split_inline_map(bundle: &str) -> Option<(&str, Vec<u8>)> {
    let start = bundle.rfind(INLINE_MAP_PREFIX)?;
    let comment = bundle[start..].trim_end();
    let (_, payload) = comment.split_once("base64,")?;
    let map = STANDARD.decode(payload).ok()?;
    Some((&bundle[..start], map))
}
