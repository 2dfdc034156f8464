//! External build tools and the stages that drive them.
//!
//! The compiler, the SASS compiler and the bundler are opaque commands.
//! Each is reached through a trait so the pipeline can run against
//! in-process fakes in tests:
//!
//! | Trait           | Default command       | Contract                                   |
//! |-----------------|-----------------------|--------------------------------------------|
//! | `Compiler`      | `npx tsc -p <config>` | emits `.js`/`.d.ts`/`.map` into `build/`   |
//! | `StyleCompiler` | `npx sass <file>`     | prints compressed CSS on stdout            |
//! | `Bundler`       | `npx browserify ...`  | prints one standalone module on stdout     |
//!
//! The stage modules (`compile`, `style`, `bundle`) own everything around
//! the tool call: preconditions, skip rules, patching, writing to dist.

pub mod bundle;
pub mod compile;
pub mod externals;
pub mod inline;
pub mod style;

pub use externals::Externals;

use crate::config::ToolsConfig;
use crate::pipeline::StageError;
use crate::utils::exec::{BENIGN_FILTER, Cmd};
use std::path::{Path, PathBuf};

// ============================================================================
// Tool traits
// ============================================================================

/// TypeScript-like compiler.
pub trait Compiler: Send + Sync {
    /// Compile the project described by `project` (a tsconfig file).
    fn compile(&self, project: &Path, cwd: &Path) -> Result<(), StageError>;
}

/// CSS preprocessor.
pub trait StyleCompiler: Send + Sync {
    /// Compile one stylesheet and return compressed CSS.
    fn compile(&self, file: &Path, load_paths: &[PathBuf]) -> Result<String, StageError>;
}

/// JavaScript bundler.
pub trait Bundler: Send + Sync {
    /// Bundle `entry` into one module exposed as the global `standalone`,
    /// leaving `externals` as runtime `require` calls.
    fn bundle(
        &self,
        entry: &Path,
        standalone: &str,
        externals: &Externals,
    ) -> Result<String, StageError>;
}

/// The three tools one pipeline run uses.
pub struct Toolchain {
    pub compiler: Box<dyn Compiler>,
    pub sass: Box<dyn StyleCompiler>,
    pub bundler: Box<dyn Bundler>,
}

impl Toolchain {
    /// Command-backed tools from `[build.tools]`.
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            compiler: Box::new(CommandCompiler::new(tools.compiler.clone())),
            sass: Box::new(CommandSass::new(tools.sass.clone())),
            bundler: Box::new(CommandBundler::new(tools.bundler.clone())),
        }
    }
}

// ============================================================================
// Command-backed implementations
// ============================================================================

/// Runs a `tsc`-compatible CLI: `<cmd> -p <project>`.
pub struct CommandCompiler {
    command: Vec<String>,
}

impl CommandCompiler {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, project: &Path, cwd: &Path) -> Result<(), StageError> {
        Cmd::from_slice(&self.command)
            .arg("-p")
            .arg(project)
            .cwd(cwd)
            .filter(&BENIGN_FILTER)
            .run()?;
        Ok(())
    }
}

/// Runs a dart-sass compatible CLI, reading CSS from stdout.
pub struct CommandSass {
    command: Vec<String>,
}

impl CommandSass {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl StyleCompiler for CommandSass {
    fn compile(&self, file: &Path, load_paths: &[PathBuf]) -> Result<String, StageError> {
        let load_args = load_paths
            .iter()
            .map(|p| format!("--load-path={}", p.display()));
        let output = Cmd::from_slice(&self.command)
            .args(["--style=compressed", "--no-source-map"])
            .args(load_args)
            .arg(file)
            .filter(&BENIGN_FILTER)
            .run()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Runs a browserify-compatible CLI, reading the bundle from stdout.
pub struct CommandBundler {
    command: Vec<String>,
}

impl CommandBundler {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Bundler for CommandBundler {
    fn bundle(
        &self,
        entry: &Path,
        standalone: &str,
        externals: &Externals,
    ) -> Result<String, StageError> {
        let mut cmd = Cmd::from_slice(&self.command)
            .arg(entry)
            .args(["--standalone", standalone, "--debug"]);
        for module in externals.iter() {
            cmd = cmd.args(["-x", module]);
        }
        if let Some(dir) = entry.parent() {
            cmd = cmd.cwd(dir);
        }
        let output = cmd.filter(&BENIGN_FILTER).run()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ============================================================================
// Test doubles
// ============================================================================
