//! Configuration section definitions.
//!
//! Each module corresponds to a section in `dappbuild.toml`:
//!
//! | Module      | TOML Section    | Purpose                                |
//! |-------------|-----------------|----------------------------------------|
//! | `build`     | `[build]`       | Tools, style inlining, publish target  |
//! | `watch`     | `[watch]`       | Watcher debounce                       |
//! | `workspace` | `[workspace]`   | Sub-builds and dapp discovery          |

mod build;
mod watch;
mod workspace;

pub use build::{BuildSectionConfig, DEFAULT_EXTERNAL_DIR, StyleConfig, ToolsConfig};
pub use watch::WatchConfig;
pub use workspace::{PublishConfig, SubBuildConfig, WorkspaceConfig};
