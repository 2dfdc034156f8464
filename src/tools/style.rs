//! Style stage.
//!
//! Compiles every non-partial `.scss` file under `src` (sorted), applies the
//! style patch table to each result, joins them with newlines and inlines
//! small `url(...)` resources as data URIs. The result is `dist/<name>.css`.
//! A unit without stylesheets produces no CSS file.

use super::StyleCompiler;
use crate::config::StyleConfig;
use crate::patch::PatchTable;
use crate::pipeline::{Outcome, StageError};
use crate::unit::BuildUnit;
use crate::utils::{mime, path::walk::collect_with_ext};
use base64::{Engine, engine::general_purpose::STANDARD};
use regex::{Captures, Regex};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")]+)(['"]?)\s*\)"#).expect("valid css url regex")
});

/// Run the style stage.
pub fn run(
    unit: &BuildUnit,
    sass: &dyn StyleCompiler,
    patches: &PatchTable,
    config: &StyleConfig,
) -> Result<Outcome, StageError> {
    let sources: Vec<PathBuf> = collect_with_ext(&unit.src, &["scss"])
        .into_iter()
        .filter(|p| !is_partial(p))
        .collect();
    if sources.is_empty() {
        return Ok(Outcome::Skipped("no stylesheets".into()));
    }

    let load_paths = existing_dirs(&unit.root, &config.include_paths);

    let mut parts = Vec::with_capacity(sources.len());
    for source in &sources {
        crate::debug!("style"; "compiling {}", source.display());
        let css = sass.compile(source, &load_paths)?;
        parts.push(patches.apply(&css));
    }

    let mut asset_dirs = vec![unit.src.clone()];
    asset_dirs.extend(existing_dirs(&unit.root, &config.asset_dirs));
    let css = inline_urls(&parts.join("\n"), &asset_dirs, config.inline_limit);

    let target = unit.stylesheet_path();
    fs::create_dir_all(&unit.dist).map_err(StageError::io(&unit.dist))?;
    fs::write(&target, css).map_err(StageError::io(&target))?;
    Ok(Outcome::Succeeded)
}

/// `_name.scss` files are only imported, never compiled on their own.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Resolve `dirs` against `root`, keeping the ones that exist.
fn existing_dirs(root: &Path, dirs: &[PathBuf]) -> Vec<PathBuf> {
    dirs.iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.is_dir())
        .collect()
}

/// Replace `url(...)` references to local files no larger than `limit`
/// bytes with base64 data URIs.
///
/// References are looked up in `dirs` in order; query strings and fragments
/// are ignored for the lookup. Remote, data and unresolvable URLs are kept.
pub fn inline_urls(css: &str, dirs: &[PathBuf], limit: u64) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures| {
            let url = caps[2].trim();
            match data_uri(url, dirs, limit) {
                Some(uri) => format!("url({uri})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn data_uri(url: &str, dirs: &[PathBuf], limit: u64) -> Option<String> {
    if url.starts_with("data:") || url.starts_with('#') || url.contains("//") {
        return None;
    }
    let path = url.split(['?', '#']).next()?.trim_start_matches('/');
    if path.is_empty() {
        return None;
    }

    let file = dirs
        .iter()
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())?;
    let size = fs::metadata(&file).ok()?.len();
    if size > limit {
        crate::debug!("style"; "not inlining {} ({} bytes)", file.display(), size);
        return None;
    }

    let bytes = fs::read(&file).ok()?;
    Some(format!(
        "data:{};base64,{}",
        mime::from_path(&file),
        STANDARD.encode(bytes)
    ))
}
