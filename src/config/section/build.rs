//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! external_dir = "node_modules/@evan.network/ui-dapp-browser/runtime/external"
//! tolerate_compile_errors = true
//! patches = "patches.toml"
//!
//! [build.tools]
//! compiler = ["npx", "tsc"]
//! sass = ["npx", "sass"]
//! bundler = ["npx", "browserify"]
//!
//! [build.style]
//! inline_limit = 228000
//! asset_dirs = ["../node_modules/ionic-angular/fonts"]
//! include_paths = ["..", "../../node_modules"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default runtime directory that receives published units.
pub const DEFAULT_EXTERNAL_DIR: &str = "node_modules/@evan.network/ui-dapp-browser/runtime/external";

/// Build pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Runtime external-modules directory, relative to the invocation cwd.
    pub external_dir: PathBuf,

    /// Log compiler errors and continue instead of failing the build.
    pub tolerate_compile_errors: bool,

    /// Replacement for the embedded bundle patch table.
    pub patches: Option<PathBuf>,

    pub tools: ToolsConfig,

    pub style: StyleConfig,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            external_dir: PathBuf::from(DEFAULT_EXTERNAL_DIR),
            tolerate_compile_errors: true,
            patches: None,
            tools: ToolsConfig::default(),
            style: StyleConfig::default(),
        }
    }
}

/// External tool command lines (program followed by leading arguments).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub compiler: Vec<String>,
    pub sass: Vec<String>,
    pub bundler: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            compiler: vec!["npx".into(), "tsc".into()],
            sass: vec!["npx".into(), "sass".into()],
            bundler: vec!["npx".into(), "browserify".into()],
        }
    }
}

/// `[build.style]` stylesheet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Largest resource (bytes) inlined as a data URI.
    pub inline_limit: u64,

    /// Extra directories searched for `url(...)` resources, relative to the unit root.
    pub asset_dirs: Vec<PathBuf>,

    /// SASS load paths, relative to the unit root. Missing ones are skipped.
    pub include_paths: Vec<PathBuf>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            inline_limit: 228_000,
            asset_dirs: Vec::new(),
            include_paths: vec![
                PathBuf::from(".."),
                PathBuf::from("../../node_modules"),
                PathBuf::from("node_modules"),
            ],
        }
    }
}

impl BuildSectionConfig {
    /// Check tool command lines are usable.
    pub fn validate(&self) -> Result<(), String> {
        for (key, cmd) in [
            ("compiler", &self.tools.compiler),
            ("sass", &self.tools.sass),
            ("bundler", &self.tools.bundler),
        ] {
            if cmd.first().is_none_or(|p| p.trim().is_empty()) {
                return Err(format!("[build.tools] {key} must name a program"));
            }
        }
        Ok(())
    }
}

/// Runners that fetch the actual tool on demand.
const PACKAGE_RUNNERS: &[&str] = &["npx", "bunx", "pnpx", "yarn"];

impl ToolsConfig {
    /// Programs that are neither on `PATH` nor fetched by a package runner.
    pub fn missing_programs(&self) -> Vec<&str> {
        [&self.compiler, &self.sass, &self.bundler]
            .into_iter()
            .filter_map(|cmd| cmd.first())
            .map(String::as_str)
            .filter(|program| {
                !PACKAGE_RUNNERS.contains(program) && which::which(program).is_err()
            })
            .collect()
    }
}
