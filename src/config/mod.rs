//! Build configuration management for `dappbuild.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build], [build.tools], [build.style]
//! │   ├── watch      # [watch]
//! │   └── workspace  # [workspace], [[workspace.builds]]
//! ├── error          # ConfigError
//! └── mod.rs         # DappConfig (this file)
//! ```
//!
//! The config file is optional. Without one every section takes its
//! defaults and the workspace root is the current directory.

mod error;
mod section;

pub use error::ConfigError;
pub use section::{
    BuildSectionConfig, PublishConfig, StyleConfig, SubBuildConfig, ToolsConfig, WatchConfig,
    WorkspaceConfig,
};

use crate::{log, utils::path::resolve_path};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing dappbuild.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DappConfig {
    /// Path to the loaded config file (empty when none was found)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Workspace root: the config file's directory, or the cwd
    #[serde(skip)]
    pub root: PathBuf,

    pub build: BuildSectionConfig,

    pub watch: WatchConfig,

    pub workspace: WorkspaceConfig,
}

impl DappConfig {
    /// Load configuration, searching upward from cwd for `config_name`.
    ///
    /// A missing file is not an error: the defaults are used and the
    /// current directory becomes the workspace root.
    pub fn load(config_name: &Path) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(config_name) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
                config.config_path = path;
                config
            }
            None => {
                crate::debug!("config"; "no {} found, using defaults", config_name.display());
                Self {
                    root: cwd.clone(),
                    ..Self::default()
                }
            }
        };

        config.finalize(&cwd);
        config.validate()?;
        Ok(config)
    }

    /// Resolve relative paths.
    ///
    /// `external_dir` is relative to the invocation cwd, everything else to
    /// the workspace root.
    fn finalize(&mut self, cwd: &Path) {
        self.build.external_dir = resolve_path(&self.build.external_dir, cwd);
        if let Some(patches) = &self.build.patches {
            self.build.patches = Some(resolve_path(patches, &self.root));
        }
        self.workspace.dapps = resolve_path(&self.workspace.dapps, &self.root);
        for build in &mut self.workspace.builds {
            build.cwd = resolve_path(&build.cwd, &self.root);
        }
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build.validate().map_err(ConfigError::Validation)?;
        self.workspace.validate().map_err(ConfigError::Validation)?;
        if let Some(patches) = &self.build.patches
            && !patches.is_file()
        {
            return Err(ConfigError::Validation(format!(
                "patch table `{}` does not exist",
                patches.display()
            )));
        }
        Ok(())
    }
}

/// Find config file by searching upward from current directory
///
/// # Example
/// ```text
/// /home/user/project/dapps/wallet/  ← cwd
/// /home/user/project/dappbuild.toml ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.is_file().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    find_config_from(&cwd, config_name)
}

/// Walk up from `start` looking for `config_name`.
fn find_config_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> DappConfig {
    let (parsed, ignored) = DappConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(DappConfig::from_str("[build\nexternal_dir = \"x\"").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\ntolerate_compile_errors = false\n[unknown_section]\nfield = 1";
        let (config, ignored) = DappConfig::parse_with_ignored(content).unwrap();
        assert!(!config.build.tolerate_compile_errors);
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_no_unknown_fields() {
        let (_, ignored) = DappConfig::parse_with_ignored("[watch]\ndebounce_ms = 10").unwrap();
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_find_config_walks_upward() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("dapps/wallet/src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("dappbuild.toml"), "").unwrap();

        let found = find_config_from(&nested, Path::new("dappbuild.toml")).unwrap();
        assert_eq!(found, dir.path().join("dappbuild.toml"));
    }

    #[test]
    fn test_find_config_missing() {
        let dir = TempDir::new().unwrap();
        assert!(find_config_from(dir.path(), Path::new("no-such-config.toml")).is_none());
    }

    #[test]
    fn test_finalize_resolves_paths() {
        let mut config = test_parse_config(
            "[[workspace.builds]]\nname = \"core\"\ncwd = \"packages/core\"\ncommand = \"make\"",
        );
        config.root = PathBuf::from("/workspace");
        config.finalize(Path::new("/invocation"));

        assert_eq!(
            config.build.external_dir,
            Path::new("/invocation").join(section::DEFAULT_EXTERNAL_DIR)
        );
        assert_eq!(config.workspace.dapps, PathBuf::from("/workspace/dapps"));
        assert_eq!(
            config.workspace.builds[0].cwd,
            PathBuf::from("/workspace/packages/core")
        );
    }

    #[test]
    fn test_missing_patch_table_rejected() {
        let mut config = test_parse_config("[build]\npatches = \"/definitely/missing.toml\"");
        config.root = PathBuf::from("/");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
