//! Pipeline sequencing for one build unit.
//!
//! # State machine
//!
//! ```text
//! Idle → Staging → Inlining → Compiling → Styling → Bundling → Promoting → CleaningUp → Done
//!          └──────────┴───────────┴──────────┴──────────┴──────────┴────────────┴─→ Failed
//! ```
//!
//! Stages run strictly in order on the calling thread. A stage either
//! succeeds, is skipped (its precondition is absent), or fails. A failure
//! stops the run: `.tmp` and `build` are deleted and the dist contents
//! cleared, so no partial bundle is left behind.
//!
//! | Stage        | Action                                                     |
//! |--------------|------------------------------------------------------------|
//! | `Staging`    | remove stale `.tmp`/`build`, clear dist, copy `src` → `.tmp` |
//! | `Inlining`   | inline templates and styles into `.tmp/**/*.ts`            |
//! | `Compiling`  | compiler over `.tmp` into `build`, copy `src/**/*.js`      |
//! | `Styling`    | `src/**/*.scss` → `dist/<name>.css`                        |
//! | `Bundling`   | `build/index.js` → `dist/<name>.js`                        |
//! | `Promoting`  | `build` → dist (no `.js`), images, publish to runtime      |
//! | `CleaningUp` | delete `build` and `.tmp`                                  |

mod error;
pub mod serve;

pub use error::{PipelineError, StageError};

use crate::config::{DappConfig, StyleConfig};
use crate::patch::PatchTable;
use crate::tools::{self, Toolchain};
use crate::unit::BuildUnit;
use crate::{debug, log, publish, stager};
use parking_lot::Mutex;
use std::{
    fmt,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// ============================================================================
// Types
// ============================================================================

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Staging,
    Inlining,
    Compiling,
    Styling,
    Bundling,
    Promoting,
    CleaningUp,
}

impl Stage {
    pub const ALL: [Self; 7] = [
        Self::Staging,
        Self::Inlining,
        Self::Compiling,
        Self::Styling,
        Self::Bundling,
        Self::Promoting,
        Self::CleaningUp,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Inlining => "inlining",
            Self::Compiling => "compiling",
            Self::Styling => "styling",
            Self::Bundling => "bundling",
            Self::Promoting => "promoting",
            Self::CleaningUp => "cleaning up",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a pipeline is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running(Stage),
    Done,
    Failed(Stage),
}

/// Result of a stage that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// The stage's precondition was absent; the reason says which.
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Per-stage outcomes of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub unit: String,
    pub stages: Vec<StageRecord>,
}

impl BuildReport {
    fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            stages: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    pub fn outcome(&self, stage: Stage) -> Option<&Outcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    pub fn skipped(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
            .map(|r| r.stage)
    }

    pub fn elapsed(&self) -> Duration {
        self.stages.iter().map(|r| r.elapsed).sum()
    }
}

/// Behaviour switches for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub tolerate_compile_errors: bool,
    pub style: StyleConfig,
    /// Runtime external-modules directory; `None` disables publishing.
    pub external_dir: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn from_config(config: &DappConfig) -> Self {
        Self {
            tolerate_compile_errors: config.build.tolerate_compile_errors,
            style: config.build.style.clone(),
            external_dir: Some(config.build.external_dir.clone()),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Builds one unit.
pub struct Pipeline {
    root: PathBuf,
    toolchain: Toolchain,
    bundle_patches: PatchTable,
    style_patches: PatchTable,
    options: PipelineOptions,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        toolchain: Toolchain,
        bundle_patches: PatchTable,
        style_patches: PatchTable,
        options: PipelineOptions,
    ) -> Self {
        Self {
            root: root.into(),
            toolchain,
            bundle_patches,
            style_patches,
            options,
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Command-backed pipeline for the unit at `root`.
    pub fn from_config(root: &Path, config: &DappConfig) -> anyhow::Result<Self> {
        let bundle_patches = PatchTable::bundle_from(config.build.patches.as_deref())?;
        let style_patches = PatchTable::style_defaults()?;
        Ok(Self::new(
            root,
            Toolchain::from_config(&config.build.tools),
            bundle_patches,
            style_patches,
            PipelineOptions::from_config(config),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }

    /// Run every stage from `Idle`.
    ///
    /// The descriptor is read first; when it is unusable nothing on disk is
    /// touched and the error is reported against `Staging`.
    pub fn run(&self) -> Result<BuildReport, PipelineError> {
        self.set_state(PipelineState::Idle);

        let unit = BuildUnit::open(&self.root).map_err(|source| {
            self.set_state(PipelineState::Failed(Stage::Staging));
            PipelineError {
                stage: Stage::Staging,
                source,
            }
        })?;

        let mut report = BuildReport::new(&unit.name);
        for stage in Stage::ALL {
            self.set_state(PipelineState::Running(stage));
            let started = Instant::now();

            match self.run_stage(stage, &unit) {
                Ok(outcome) => {
                    if let Outcome::Skipped(reason) = &outcome {
                        log!("skip"; "{}: {}", stage, reason);
                    }
                    let elapsed = started.elapsed();
                    debug!("pipeline"; "{} {:?} in {:?}", stage, outcome, elapsed);
                    report.stages.push(StageRecord {
                        stage,
                        outcome,
                        elapsed,
                    });
                }
                Err(source) => {
                    cleanup_failed(&unit);
                    self.set_state(PipelineState::Failed(stage));
                    return Err(PipelineError { stage, source });
                }
            }
        }

        self.set_state(PipelineState::Done);
        Ok(report)
    }

    fn run_stage(&self, stage: Stage, unit: &BuildUnit) -> Result<Outcome, StageError> {
        match stage {
            Stage::Staging => {
                stager::clean(&[&unit.tmp, &unit.build]);
                stager::clear_contents(&unit.dist);
                stager::stage(unit)?;
                Ok(Outcome::Succeeded)
            }
            Stage::Inlining => tools::inline::inline_dir(&unit.tmp),
            Stage::Compiling => tools::compile::run(
                unit,
                self.toolchain.compiler.as_ref(),
                self.options.tolerate_compile_errors,
            ),
            Stage::Styling => tools::style::run(
                unit,
                self.toolchain.sass.as_ref(),
                &self.style_patches,
                &self.options.style,
            ),
            Stage::Bundling => {
                tools::bundle::run(unit, self.toolchain.bundler.as_ref(), &self.bundle_patches)
            }
            Stage::Promoting => {
                stager::promote(&unit.build, &unit.dist, Some("js"))?;
                stager::copy_matching(&unit.src, &unit.dist, stager::IMAGE_EXTENSIONS)?;
                if let Some(external_dir) = &self.options.external_dir
                    && let Outcome::Skipped(reason) = publish::publish_unit(unit, external_dir)?
                {
                    debug!("publish"; "{}", reason);
                }
                Ok(Outcome::Succeeded)
            }
            Stage::CleaningUp => {
                stager::clean(&[&unit.build, &unit.tmp]);
                Ok(Outcome::Succeeded)
            }
        }
    }
}

/// Remove everything a failed run may have produced.
fn cleanup_failed(unit: &BuildUnit) {
    stager::clean(&[&unit.tmp, &unit.build]);
    stager::clear_contents(&unit.dist);
}

// ============================================================================
// tests
// ============================================================================
