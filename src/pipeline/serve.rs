//! Serve mode for a single unit.
//!
//! Builds once, then rebuilds from `Idle` whenever `src/**` or the
//! descriptor changes. Rebuilds go through the coordinator keyed by the
//! unit root, so changes during a build coalesce into one follow-up.

use super::{BuildReport, Pipeline, PipelineError};
use crate::coordinator::{Build, RebuildCoordinator};
use crate::logger::{status_error, status_success};
use crate::unit::DESCRIPTOR_FILE;
use crate::watch::{self, WatchTarget};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// A unit pipeline as a coordinator build.
pub struct UnitBuild {
    key: String,
    pipeline: Pipeline,
}

impl UnitBuild {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            key: pipeline.root().to_string_lossy().to_string(),
            pipeline,
        }
    }
}

impl Build for UnitBuild {
    fn key(&self) -> &str {
        &self.key
    }

    fn run(&self) {
        report_status(&self.pipeline.run());
    }
}

/// Show the result of a run as the single watch status block.
pub fn report_status(result: &Result<BuildReport, PipelineError>) {
    match result {
        Ok(report) => status_success(&format!(
            "built {} in {}ms",
            report.unit,
            report.elapsed().as_millis()
        )),
        Err(err) => status_error(&err.to_string(), &err.detail()),
    }
}

/// Build the unit, then watch it until Ctrl+C.
pub fn serve(pipeline: Pipeline, debounce: Duration) -> Result<()> {
    let root = pipeline.root().to_path_buf();
    let build: Arc<dyn Build> = Arc::new(UnitBuild::new(pipeline));
    let target = WatchTarget::new(
        [root.join("src"), root.join(DESCRIPTOR_FILE)],
        Arc::clone(&build),
    );
    watch::serve(Arc::new(RebuildCoordinator::new()), vec![target], debounce, vec![build])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CommandState;
    use crate::patch::PatchTable;
    use crate::pipeline::{PipelineOptions, StageError};
    use crate::tools::fake::{CopyCompiler, EchoSass, WrapBundler};
    use crate::tools::{Compiler, Toolchain};
    use crossbeam::channel::{Receiver, Sender, unbounded};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Holds each compile until the test releases it.
    struct GatedCompiler {
        inner: CopyCompiler,
        calls: Arc<AtomicUsize>,
        started: Sender<()>,
        gate: Receiver<()>,
    }

    impl Compiler for GatedCompiler {
        fn compile(&self, project: &Path, cwd: &Path) -> Result<(), StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.started.send(());
            let _ = self.gate.recv_timeout(TIMEOUT);
            self.inner.compile(project, cwd)
        }
    }

    #[tokio::test]
    async fn test_changes_during_build_rerun_pipeline_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("sample");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("dbcp.json"), r#"{"public": {"name": "sample"}}"#).unwrap();
        fs::write(root.join("tsconfig.json"), "{}").unwrap();
        fs::write(root.join("src/index.ts"), "export const answer = 42;").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started) = unbounded();
        let (release, gate) = unbounded();
        let toolchain = Toolchain {
            compiler: Box::new(GatedCompiler {
                inner: CopyCompiler::default(),
                calls: Arc::clone(&calls),
                started: started_tx,
                gate,
            }),
            sass: Box::new(EchoSass),
            bundler: Box::new(WrapBundler::default()),
        };
        let pipeline = Pipeline::new(
            &root,
            toolchain,
            PatchTable::default(),
            PatchTable::default(),
            PipelineOptions {
                tolerate_compile_errors: true,
                style: Default::default(),
                external_dir: None,
            },
        );
        let build = Arc::new(UnitBuild::new(pipeline));
        let key = build.key().to_string();
        let coordinator = Arc::new(RebuildCoordinator::new());

        let handle = coordinator.request(build.clone()).unwrap();
        started.recv_timeout(TIMEOUT).unwrap();
        for _ in 0..3 {
            fs::write(root.join("src/index.ts"), "export const answer = 43;").unwrap();
            assert!(coordinator.request(build.clone()).is_none());
        }
        assert_eq!(coordinator.state(&key), CommandState::RunningRebuildPending);

        release.send(()).unwrap();
        started.recv_timeout(TIMEOUT).unwrap();
        release.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.state(&key), CommandState::Idle);
        assert!(!root.join(".tmp").exists());
        assert!(!root.join("build").exists());
        let bundle = fs::read_to_string(root.join("dist/sample.js")).unwrap();
        assert!(bundle.contains("answer = 43"));
    }

    #[test]
    fn test_unit_build_keyed_by_root() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            dir.path(),
            crate::tools::fake::toolchain(),
            PatchTable::default(),
            PatchTable::default(),
            PipelineOptions {
                tolerate_compile_errors: true,
                style: Default::default(),
                external_dir: None,
            },
        );
        let build = UnitBuild::new(pipeline);
        assert_eq!(build.key(), dir.path().to_string_lossy());
    }
}
