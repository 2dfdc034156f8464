//! External sub-build commands run through the coordinator.

use super::Build;
use crate::config::PublishConfig;
use crate::publish;
use crate::utils::exec::{BENIGN_FILTER, Cmd};
use crate::{debug, log};
use std::path::{Path, PathBuf};

/// A shell command with a working directory, optionally followed by a
/// publish step into the external-modules directory.
#[derive(Debug, Clone)]
pub struct SubBuild {
    pub name: String,
    pub cwd: PathBuf,
    pub command: String,
    pub publish: Option<Publish>,
}

/// Resolved publish step of a sub-build.
#[derive(Debug, Clone)]
pub struct Publish {
    pub files: Vec<PathBuf>,
    pub dest: PathBuf,
    pub descriptor: Option<PathBuf>,
}

impl Publish {
    pub fn new(config: &PublishConfig, cwd: &Path, external_dir: &Path) -> Self {
        Self {
            files: config.files.clone(),
            dest: external_dir.join(&config.to),
            descriptor: config.descriptor.as_ref().map(|d| cwd.join(d)),
        }
    }
}

impl SubBuild {
    pub fn new(name: impl Into<String>, cwd: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cwd: cwd.into(),
            command: command.into(),
            publish: None,
        }
    }

    pub fn with_publish(mut self, publish: Publish) -> Self {
        self.publish = Some(publish);
        self
    }

    /// Run the command and publish. Returns whether the command exited 0.
    pub fn execute(&self) -> bool {
        log!("workspace"; "running: {} : {}", self.cwd.display(), self.command);

        let success = match Cmd::shell(&self.command).cwd(&self.cwd).run_unchecked() {
            Ok(output) => {
                BENIGN_FILTER.log(&self.name, String::from_utf8_lossy(&output.stderr).trim());
                debug!("workspace"; "{} exited with {}", self.name, output.status);
                output.status.success()
            }
            Err(e) => {
                log!("error"; "{}: {}", self.name, e);
                false
            }
        };

        if let Some(publish) = &self.publish {
            self.publish(publish);
        }

        log!("workspace"; "finished: {}", self.name);
        success
    }

    fn publish(&self, publish: &Publish) {
        let result = publish::publish_files(&self.cwd, &publish.files, &publish.dest).and_then(
            |copied| {
                if let Some(descriptor) = &publish.descriptor {
                    publish::write_sidecar(&publish.dest, descriptor)?;
                }
                Ok(copied)
            },
        );
        match result {
            Ok(copied) => {
                log!("publish"; "{}: {} files -> {}", self.name, copied, publish.dest.display())
            }
            Err(e) => log!("error"; "{}: publish failed: {}", self.name, e),
        }
    }
}

impl Build for SubBuild {
    fn key(&self) -> &str {
        &self.name
    }

    fn run(&self) {
        self.execute();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[cfg(unix)]
    fn test_command_runs_in_cwd() {
        let dir = TempDir::new().unwrap();
        let build = SubBuild::new("touch", dir.path(), "echo built > out.txt");

        assert!(build.execute());
        assert_eq!(
            fs::read_to_string(dir.path().join("out.txt")).unwrap().trim(),
            "built"
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_failing_command_still_publishes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dbcp.json"), "{}").unwrap();
        let external = dir.path().join("external");
        let config = PublishConfig {
            files: vec![PathBuf::from("dbcp.json")],
            to: PathBuf::from("smartcontracts"),
            descriptor: Some(PathBuf::from("dbcp.json")),
        };
        let build = SubBuild::new("core", dir.path(), "exit 3")
            .with_publish(Publish::new(&config, dir.path(), &external));

        assert!(!build.execute());
        let dest = external.join("smartcontracts");
        assert!(dest.join("dbcp.json").is_file());
        assert!(dest.join(publish::SIDECAR_FILE).is_file());
    }
}
