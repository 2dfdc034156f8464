//! `docs`: combine README files into `documentation/README.md`.

use crate::{log, utils::path::normalize_path};
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{fs, path::Path, sync::LazyLock};

const TITLE: &str = "# Combined Documentation";
const SEPARATOR: &str = "\n---\n";

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#").expect("valid heading regex"));

/// Write `<dapp>/documentation/README.md` from the dapp's README.
pub fn build_docs(root: &Path) -> Result<()> {
    let root = normalize_path(root);
    let readme = root.join("README.md");
    if !readme.is_file() {
        bail!("{} not found", readme.display());
    }
    let content =
        fs::read_to_string(&readme).with_context(|| format!("failed to read {}", readme.display()))?;

    let out_dir = root.join("documentation");
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let target = out_dir.join("README.md");
    fs::write(&target, combine(&[content]))
        .with_context(|| format!("failed to write {}", target.display()))?;

    log!("docs"; "{}", target.display());
    Ok(())
}

/// Demote every heading one level, separate documents with a rule and put
/// one title above all of them.
pub fn combine(readmes: &[String]) -> String {
    let body: Vec<String> = readmes
        .iter()
        .map(|readme| format!("{SEPARATOR}{readme}"))
        .map(|readme| HEADING.replace_all(&readme, "##").into_owned())
        .collect();
    format!("{TITLE}{}", body.join("\n"))
}
