//! External command execution utilities.
//!
//! Provides a Builder-based API for running the external build tools
//! (compiler, style compiler, bundler, workspace sub-build commands).
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Tool invocation, stdout captured
//! let output = Cmd::from_slice(&["npx", "sass"])
//!     .args(["--style=compressed", "main.scss"])
//!     .cwd(root)
//!     .run()?;
//!
//! // Shell command string, exit status left to the caller
//! let output = Cmd::shell("npm run build").cwd(root).run_unchecked()?;
//! ```

use crate::log;
use regex::Regex;
use std::{
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::{Command, Output},
    sync::OnceLock,
};
use thiserror::Error;

/// Errors produced while running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started at all.
    #[error("failed to execute `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("{message}")]
    Failed { program: String, message: String },
}

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    filter: Option<&'static FilterRule>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["tsc"]` or `["npx", "browserify"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Run a command line through the platform shell.
    pub fn shell(command: &str) -> Self {
        if cfg!(windows) {
            Self::new("cmd").args(["/C", command])
        } else {
            Self::new("sh").args(["-c", command])
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set output filter for logging.
    pub fn filter(mut self, filter: &'static FilterRule) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Program name for log lines and error messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Execute the command; a non-zero exit is an error.
    ///
    /// stderr of a successful run is logged through the filter.
    pub fn run(self) -> Result<Output, ExecError> {
        let filter = self.filter.unwrap_or(&EMPTY_FILTER);
        let name = self.program_name();
        let output = self.run_unchecked()?;

        if !output.status.success() {
            return Err(ExecError::Failed {
                message: format_error(&name, &output, filter),
                program: name,
            });
        }

        filter.log(&name, String::from_utf8_lossy(&output.stderr).trim());
        Ok(output)
    }

    /// Execute the command and return its output whatever the exit status.
    pub fn run_unchecked(self) -> Result<Output, ExecError> {
        let name = self.program_name();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        crate::debug!("exec"; "{} {}", name, self.args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" "));

        cmd.output().map_err(|source| ExecError::Spawn {
            program: name,
            source,
        })
    }
}

// ============================================================================
// Output Filtering
// ============================================================================

/// Filter rule for command output logging.
///
/// Lines containing any of the known-benign substrings are dropped
/// before the output is surfaced.
pub struct FilterRule {
    /// Substrings marking a line as noise.
    pub skip: &'static [&'static str],
}

impl FilterRule {
    /// Create a new filter rule.
    pub const fn new(skip: &'static [&'static str]) -> Self {
        Self { skip }
    }

    /// Check if a line should be skipped.
    fn should_skip(&self, line: &str) -> bool {
        line.is_empty() || self.skip.iter().any(|p| line.contains(p))
    }

    /// Keep only the lines that pass the filter.
    pub fn apply(&self, output: &str) -> String {
        output
            .lines()
            .filter(|line| {
                let plain = strip_ansi(line);
                !self.should_skip(plain.trim())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Log output lines that pass the filter.
    pub fn log(&self, name: &str, output: &str) {
        let kept = self.apply(output);
        if !kept.is_empty() {
            log!(name; "{}", kept);
        }
    }
}

/// Empty filter (no skipping).
pub const EMPTY_FILTER: FilterRule = FilterRule::new(&[]);

/// Known-harmless warnings printed by compiler and bundler toolchains.
pub const BENIGN_FILTER: FilterRule = FilterRule::new(&[
    "The following options have been renamed",
    "The 'this' keyword is equivalent",
    "treating it as an external dependency",
    "No name was provided for external module",
    "'default' is not exported by",
]);

// ============================================================================
// Helpers
// ============================================================================

/// Strip ANSI escape codes from string.
fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ansi regex"));
    re.replace_all(s, "")
}

/// Format error message for failed command.
fn format_error(name: &str, output: &Output, filter: &FilterRule) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let mut msg = format!("`{name}` failed with {}", output.status);
    let error_msg = filter.apply(stderr.trim());
    if !error_msg.is_empty() {
        msg.push('\n');
        msg.push_str(&error_msg);
    }

    // tsc reports diagnostics on stdout
    let stdout_trimmed = stdout.trim();
    if !stdout_trimmed.is_empty() && stdout_trimmed.len() < 16 * 1024 {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout_trimmed);
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::new("browserify")
            .arg("build/index.js")
            .args(["--standalone", "sample"])
            .cwd("/tmp");

        assert_eq!(cmd.program, OsString::from("browserify"));
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_from_slice() {
        let cmd = Cmd::from_slice(&["npx", "tsc"]).arg("-p");
        assert_eq!(cmd.program_name(), "npx");
        assert_eq!(cmd.args, vec![OsString::from("tsc"), OsString::from("-p")]);
    }

    #[test]
    fn test_empty_args_filtered() {
        let cmd = Cmd::new("echo").arg("").args(["a", "", "b"]);
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn test_filter_rule_substrings() {
        let filter = FilterRule::new(&["treating it as an external dependency"]);
        assert!(filter.should_skip("'rxjs' is imported, treating it as an external dependency"));
        assert!(!filter.should_skip("Error: cannot find module"));
        assert!(filter.should_skip(""));
    }

    #[test]
    fn test_filter_apply_keeps_order() {
        let filter = FilterRule::new(&["noise"]);
        let kept = filter.apply("first\nsome noise here\n\nsecond");
        assert_eq!(kept, "first\nsecond");
    }

    #[test]
    fn test_benign_filter() {
        let stderr = "(!) 'default' is not exported by node_modules/x.js\n\
                      \x1b[33mThe following options have been renamed\x1b[0m\n\
                      Error: Cannot find module './missing'";
        assert_eq!(
            BENIGN_FILTER.apply(stderr),
            "Error: Cannot find module './missing'"
        );
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }

    #[cfg(unix)]
    #[test]
    fn test_simple_command() {
        let output = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_command_is_error() {
        let err = Cmd::shell("echo broken >&2; exit 3").run().unwrap_err();
        match err {
            ExecError::Failed { message, .. } => assert!(message.contains("broken")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_unchecked_returns_failed_output() {
        let output = Cmd::shell("exit 4").run_unchecked().unwrap();
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_spawn_error() {
        let err = Cmd::new("definitely-not-a-real-tool-4711").run().unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
