//! `[workspace]` section configuration.
//!
//! A workspace is a set of independently buildable units, each driven by an
//! external command. Units come from two places: explicit `[[workspace.builds]]`
//! entries and every directory under `dapps`.
//!
//! # Example
//!
//! ```toml
//! [workspace]
//! dapps = "dapps"
//! dapp_command = "npm run dapp-build \"dapps/{name}\""
//!
//! [[workspace.builds]]
//! name = "smart-contracts"
//! cwd = "node_modules/@evan.network/smart-contracts-core"
//! command = "npm run build-contracts"
//! watch = ["contracts"]
//!
//! [workspace.builds.publish]
//! files = ["compiled.js", "dbcp.json"]
//! to = "smartcontracts"
//! descriptor = "dbcp.json"
//!
//! [[workspace.builds]]
//! name = "bcc"
//! cwd = "node_modules/@evan.network/api-blockchain-core"
//! command = "npm run build"
//! watch = ["src"]
//! then = ["bcc-bundles"]
//!
//! [[workspace.builds]]
//! name = "bcc-bundles"
//! cwd = "node_modules/@evan.network/api-blockchain-core"
//! command = "npm run build-bundles"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Placeholder replaced by the dapp directory name in `dapp_command`.
pub const NAME_PLACEHOLDER: &str = "{name}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory whose subdirectories are dapp units.
    pub dapps: PathBuf,

    /// Command run for each discovered dapp, from the workspace root.
    pub dapp_command: String,

    pub builds: Vec<SubBuildConfig>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dapps: PathBuf::from("dapps"),
            dapp_command: "npm run dapp-build \"dapps/{name}\"".to_string(),
            builds: Vec::new(),
        }
    }
}

/// One explicitly configured sub-build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubBuildConfig {
    pub name: String,

    /// Working directory, relative to the workspace root.
    pub cwd: PathBuf,

    /// Shell command line.
    pub command: String,

    /// Paths (relative to `cwd`) whose changes trigger this build in serve mode.
    pub watch: Vec<PathBuf>,

    /// Copy outputs into the runtime after each run.
    pub publish: Option<PublishConfig>,

    /// Builds requested whenever this one finishes.
    pub then: Vec<String>,
}

impl Default for SubBuildConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            cwd: PathBuf::from("."),
            command: String::new(),
            watch: Vec::new(),
            publish: None,
            then: Vec::new(),
        }
    }
}

/// Files copied into `<external_dir>/<to>` after a sub-build finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Files relative to the sub-build `cwd`.
    pub files: Vec<PathBuf>,

    /// Target folder below the external-modules directory.
    pub to: PathBuf,

    /// Descriptor referenced by the `dbcpPath.json` sidecar.
    pub descriptor: Option<PathBuf>,
}

impl WorkspaceConfig {
    /// Expand `dapp_command` for one dapp directory name.
    pub fn dapp_command_for(&self, name: &str) -> String {
        self.dapp_command.replace(NAME_PLACEHOLDER, name)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = rustc_hash::FxHashSet::default();
        for build in &self.builds {
            if build.name.trim().is_empty() {
                return Err("[[workspace.builds]] entry without a name".to_string());
            }
            if build.command.trim().is_empty() {
                return Err(format!("workspace build `{}` has an empty command", build.name));
            }
            if !seen.insert(build.name.as_str()) {
                return Err(format!("duplicate workspace build `{}`", build.name));
            }
            if build.then.contains(&build.name) {
                return Err(format!("workspace build `{}` chains to itself", build.name));
            }
            if let Some(publish) = &build.publish
                && publish.to.as_os_str().is_empty()
            {
                return Err(format!("workspace build `{}` publishes without `to`", build.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::PathBuf;

    #[test]
    fn test_workspace_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.workspace.dapps, PathBuf::from("dapps"));
        assert!(config.workspace.builds.is_empty());
        assert_eq!(
            config.workspace.dapp_command_for("wallet"),
            "npm run dapp-build \"dapps/wallet\""
        );
    }

    #[test]
    fn test_workspace_builds() {
        let config = test_parse_config(
            r#"
[[workspace.builds]]
name = "contracts"
cwd = "node_modules/@evan.network/smart-contracts-core"
command = "npm run build-contracts"
watch = ["contracts"]

[workspace.builds.publish]
files = ["compiled.js", "dbcp.json"]
to = "smartcontracts"
descriptor = "dbcp.json"

[[workspace.builds]]
name = "core"
command = "npm run build"
"#,
        );
        let builds = &config.workspace.builds;
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].watch, vec![PathBuf::from("contracts")]);
        let publish = builds[0].publish.as_ref().unwrap();
        assert_eq!(publish.to, PathBuf::from("smartcontracts"));
        assert_eq!(publish.descriptor, Some(PathBuf::from("dbcp.json")));
        assert_eq!(builds[1].cwd, PathBuf::from("."));
        assert!(builds[1].publish.is_none());
        assert!(config.workspace.validate().is_ok());
    }

    #[test]
    fn test_workspace_duplicate_names_rejected() {
        let config = test_parse_config(
            "[[workspace.builds]]\nname = \"a\"\ncommand = \"x\"\n\
             [[workspace.builds]]\nname = \"a\"\ncommand = \"y\"",
        );
        let err = config.workspace.validate().unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_workspace_then() {
        let config = test_parse_config(
            "[[workspace.builds]]\nname = \"bcc\"\ncommand = \"npm run build\"\n\
             then = [\"bcc-bundles\"]\n\
             [[workspace.builds]]\nname = \"bcc-bundles\"\ncommand = \"npm run build-bundles\"",
        );
        assert_eq!(config.workspace.builds[0].then, vec!["bcc-bundles"]);
        assert!(config.workspace.builds[1].then.is_empty());
        assert!(config.workspace.validate().is_ok());
    }

    #[test]
    fn test_workspace_self_chain_rejected() {
        let config = test_parse_config(
            "[[workspace.builds]]\nname = \"a\"\ncommand = \"x\"\nthen = [\"a\"]",
        );
        assert!(config.workspace.validate().unwrap_err().contains("itself"));
    }

    #[test]
    fn test_workspace_empty_command_rejected() {
        let config = test_parse_config("[[workspace.builds]]\nname = \"a\"");
        assert!(config.workspace.validate().is_err());
    }
}
