//! File watching for serve modes.
//!
//! ```text
//! notify (own thread) → tokio channel → Debouncer → matching targets → RebuildCoordinator
//! ```
//!
//! The watcher is created before any initial build runs, so changes made
//! while that build is in progress are buffered rather than lost.

mod debouncer;

pub use debouncer::Debouncer;

use crate::coordinator::{Build, RebuildCoordinator};
use crate::utils::path::normalize_path;
use crate::{debug, log};
use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often the loop checks for a shutdown signal.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// How long in-flight builds may take to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Paths whose changes trigger one build.
pub struct WatchTarget {
    /// Directories (recursive) or single files.
    pub roots: Vec<PathBuf>,
    pub build: Arc<dyn Build>,
}

impl WatchTarget {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>, build: Arc<dyn Build>) -> Self {
        Self {
            roots: roots.into_iter().map(|p| normalize_path(&p)).collect(),
            build,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}

/// Targets touched by `paths`, each at most once.
pub fn triggered<'a, I, P>(targets: &'a [WatchTarget], paths: I) -> Vec<&'a WatchTarget>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let paths: Vec<P> = paths.into_iter().collect();
    let mut seen = FxHashSet::default();
    targets
        .iter()
        .filter(|target| paths.iter().any(|p| target.matches(p.as_ref())))
        .filter(|target| seen.insert(target.build.key().to_string()))
        .collect()
}

// =============================================================================
// Watcher
// =============================================================================

pub struct FileWatcher {
    /// sync -> async bridge
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// must be kept alive
    _watcher: RecommendedWatcher,
    targets: Vec<WatchTarget>,
    debouncer: Debouncer,
}

impl FileWatcher {
    /// Start watching every target root.
    ///
    /// Directories are watched recursively. Files are watched through their
    /// parent directory. Roots that do not exist are skipped.
    pub fn new(targets: Vec<WatchTarget>, debounce: Duration) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watched = FxHashSet::default();
        for root in targets.iter().flat_map(|t| &t.roots) {
            let (path, recursive) = if root.is_dir() {
                (root.clone(), true)
            } else if let Some(parent) = root.parent().filter(|_| root.is_file()) {
                (parent.to_path_buf(), false)
            } else {
                debug!("watch"; "{} does not exist, not watched", root.display());
                continue;
            };
            if watched.insert((path.clone(), recursive)) {
                let mode = if recursive {
                    RecursiveMode::Recursive
                } else {
                    RecursiveMode::NonRecursive
                };
                watcher.watch(&path, mode)?;
            }
        }

        Ok(Self {
            notify_rx,
            _watcher: watcher,
            targets,
            debouncer: Debouncer::new(debounce),
        })
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(self, coordinator: Arc<RebuildCoordinator>, shutdown_rx: Receiver<()>) {
        let notify_rx = self.notify_rx;
        let targets = self.targets;
        let mut debouncer = self.debouncer;
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        let (async_tx, mut async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);

        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration().min(SHUTDOWN_POLL)) => {
                    if shutdown_rx.try_recv().is_ok() || crate::shutdown::is_shutdown() {
                        debug!("watch"; "shutdown signal received");
                        break;
                    }
                    let Some(changes) = debouncer.take_if_ready() else {
                        continue;
                    };
                    for (path, kind) in &changes {
                        debug!("watch"; "{}: {}", kind.label(), path.display());
                    }
                    in_flight.retain(|handle| !handle.is_finished());
                    for target in triggered(&targets, changes.keys()) {
                        log!("watch"; "{} changed", target.build.key());
                        if let Some(handle) = coordinator.request(Arc::clone(&target.build)) {
                            in_flight.push(handle);
                        }
                    }
                }
            }
        }

        for handle in in_flight {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }
    }
}

/// Watch `targets` until Ctrl+C, running `initial` builds first.
///
/// Blocks the calling thread on a dedicated tokio runtime. Builds go
/// through `coordinator`, so chains registered on it apply.
pub fn serve(
    coordinator: Arc<RebuildCoordinator>,
    targets: Vec<WatchTarget>,
    debounce: Duration,
    initial: Vec<Arc<dyn Build>>,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    crate::shutdown::register_watcher(shutdown_tx);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        let watcher = FileWatcher::new(targets, debounce).context("failed to start watcher")?;

        for build in initial {
            if let Some(handle) = coordinator.request(build) {
                let _ = handle.await;
            }
        }

        log!("watch"; "watching for changes, press Ctrl+C to stop");
        watcher.run(coordinator, shutdown_rx).await;
        Ok::<_, anyhow::Error>(())
    })
}
