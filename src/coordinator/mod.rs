//! Rebuild Coordinator - serialises builds per command
//!
//! # State machine
//!
//! ```text
//!          request                 request
//! Idle ───────────→ Running ───────────────→ RunningRebuildPending
//!  ↑                  │  ↑                          │
//!  └──── finished ────┘  └──── finished (rerun) ────┘
//! ```
//!
//! At most one build per key runs at a time. Any number of requests that
//! arrive while a build is running collapse into exactly one follow-up.
//! Builds chained with [`RebuildCoordinator::chain`] are requested after
//! every run of their trigger, so they coalesce the same way.
//! Builds run on tokio's blocking pool; the state map lives in the
//! coordinator instance, not in a global.

pub mod command;

pub use command::SubBuild;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A build the coordinator can run.
pub trait Build: Send + Sync + 'static {
    /// Identity used for coalescing; requests with equal keys share a state.
    fn key(&self) -> &str;

    /// Run to completion. Failures are reported by the build itself.
    fn run(&self);
}

/// Per-command coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandState {
    #[default]
    Idle,
    Running,
    RunningRebuildPending,
}

#[derive(Default)]
pub struct RebuildCoordinator {
    states: Mutex<FxHashMap<String, CommandState>>,
    followers: Mutex<FxHashMap<String, Vec<Arc<dyn Build>>>>,
}

impl RebuildCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a (re)build.
    ///
    /// Starts the build when its key is idle and returns a handle that
    /// resolves once the build and any coalesced follow-up are done.
    /// Returns `None` when a build is already running; that build is then
    /// followed by exactly one more.
    pub fn request(self: &Arc<Self>, build: Arc<dyn Build>) -> Option<JoinHandle<()>> {
        {
            let mut states = self.states.lock();
            let state = states.entry(build.key().to_string()).or_default();
            match *state {
                CommandState::Idle => *state = CommandState::Running,
                CommandState::Running | CommandState::RunningRebuildPending => {
                    *state = CommandState::RunningRebuildPending;
                    crate::debug!("coordinator"; "{}: rebuild queued", build.key());
                    return None;
                }
            }
        }

        let coordinator = Arc::clone(self);
        Some(tokio::task::spawn_blocking(move || coordinator.drive(build.as_ref())))
    }

    /// Request `next` each time a build of `key` finishes.
    pub fn chain(&self, key: &str, next: Arc<dyn Build>) {
        self.followers
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(next);
    }

    /// Current state of `key`.
    pub fn state(&self, key: &str) -> CommandState {
        self.states.lock().get(key).copied().unwrap_or_default()
    }

    fn drive(self: &Arc<Self>, build: &dyn Build) {
        let _reset = ResetOnPanic {
            states: &self.states,
            key: build.key(),
        };
        loop {
            build.run();
            self.request_followers(build.key());
            if !self.finish(build.key()) {
                break;
            }
            crate::log!("coordinator"; "{}: rebuilding...", build.key());
        }
    }

    fn request_followers(self: &Arc<Self>, key: &str) {
        let followers = self.followers.lock().get(key).cloned().unwrap_or_default();
        for next in followers {
            crate::debug!("coordinator"; "{} -> {}", key, next.key());
            // runs detached; a busy follower just queues its rerun
            let _ = self.request(next);
        }
    }

    /// Leave `Running`; returns whether a follow-up build is due.
    fn finish(&self, key: &str) -> bool {
        let mut states = self.states.lock();
        match states.get(key).copied().unwrap_or_default() {
            CommandState::RunningRebuildPending => {
                states.insert(key.to_string(), CommandState::Running);
                true
            }
            CommandState::Running | CommandState::Idle => {
                states.remove(key);
                false
            }
        }
    }
}

/// Puts a key back to `Idle` when its build panics, so later requests
/// start a fresh build instead of queueing behind a dead one.
struct ResetOnPanic<'a> {
    states: &'a Mutex<FxHashMap<String, CommandState>>,
    key: &'a str,
}

impl Drop for ResetOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.states.lock().remove(self.key);
            crate::log!("error"; "{}: build panicked", self.key);
        }
    }
}
