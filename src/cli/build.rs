//! `build` and `clean` for a single dapp.

use crate::{
    config::DappConfig,
    log,
    pipeline::{self, Pipeline},
    stager,
    unit::Layout,
    utils::path::normalize_path,
};
use anyhow::{Result, bail};
use std::path::Path;

/// Build the dapp at `root` once, or keep rebuilding it with `serve`.
pub fn build_unit(root: &Path, config: &DappConfig, serve: bool) -> Result<()> {
    let root = normalize_path(root);
    if !root.is_dir() {
        bail!("dapp directory `{}` does not exist", root.display());
    }
    warn_missing_tools(config);

    let pipeline = Pipeline::from_config(&root, config)?;
    if serve {
        return pipeline::serve::serve(pipeline, config.watch.debounce());
    }

    log!("build"; "{}", root.display());
    let report = match pipeline.run() {
        Ok(report) => report,
        Err(err) => {
            log!("failed"; "{}: {}", err, err.detail());
            return Err(err.into());
        }
    };

    for stage in report.skipped() {
        crate::debug!("build"; "{} skipped", stage);
    }
    log!("build"; "{} done in {}ms", report.unit, report.elapsed().as_millis());
    Ok(())
}

/// Remove `.tmp`, `build` and the dist contents. The descriptor is not read.
pub fn clean_unit(root: &Path) -> Result<()> {
    let root = normalize_path(root);
    if !root.is_dir() {
        bail!("dapp directory `{}` does not exist", root.display());
    }

    let layout = Layout::new(&root);
    stager::clean(&[&layout.tmp, &layout.build]);
    if layout.dist.is_dir() {
        stager::clear_contents(&layout.dist);
    }
    log!("clean"; "{}", root.display());
    Ok(())
}

fn warn_missing_tools(config: &DappConfig) {
    for program in config.build.tools.missing_programs() {
        log!("warning"; "`{}` not found in PATH", program);
    }
}
