//! `workspace`: configured sub-builds plus every dapp under `dapps`.
//!
//! One-shot mode runs each build once, in order, with every build after
//! the builds that chain to it through `then`. Serve mode only watches: a
//! build runs when one of its watch paths changes or a build chaining to it
//! finishes, serialised and coalesced per build by the coordinator.

use crate::{
    config::DappConfig,
    coordinator::{Build, RebuildCoordinator, SubBuild, command::Publish},
    debug, log,
    unit::DESCRIPTOR_FILE,
    utils::path::list_dirs,
    watch::{self, WatchTarget},
};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use std::{path::PathBuf, sync::Arc};

/// A sub-build, the paths that retrigger it and the builds it triggers.
#[derive(Debug)]
pub struct WorkspaceBuild {
    pub build: SubBuild,
    pub watch: Vec<PathBuf>,
    pub then: Vec<String>,
}

pub fn run_workspace(config: &DappConfig, serve: bool, only: &[String]) -> Result<()> {
    let builds = run_order(select(collect_builds(config)?, only)?)?;
    if builds.is_empty() {
        log!("workspace"; "nothing to build");
        return Ok(());
    }

    if serve {
        let coordinator = Arc::new(RebuildCoordinator::new());
        let targets = watch_targets(builds, &coordinator);
        return watch::serve(coordinator, targets, config.watch.debounce(), Vec::new());
    }

    let failed: Vec<String> = builds
        .iter()
        .filter(|b| !b.build.execute())
        .map(|b| b.build.name.clone())
        .collect();
    if !failed.is_empty() {
        bail!("{} of {} builds failed: {}", failed.len(), builds.len(), failed.join(", "));
    }
    Ok(())
}

/// Configured builds first, then one build per directory under `dapps`.
///
/// A dapp directory named like a configured build is left to that build.
pub fn collect_builds(config: &DappConfig) -> Result<Vec<WorkspaceBuild>> {
    let workspace = &config.workspace;
    let mut builds: Vec<WorkspaceBuild> = workspace
        .builds
        .iter()
        .map(|entry| {
            let mut build = SubBuild::new(&entry.name, &entry.cwd, &entry.command);
            if let Some(publish) = &entry.publish {
                build = build.with_publish(Publish::new(
                    publish,
                    &entry.cwd,
                    &config.build.external_dir,
                ));
            }
            WorkspaceBuild {
                watch: entry.watch.iter().map(|w| entry.cwd.join(w)).collect(),
                then: entry.then.clone(),
                build,
            }
        })
        .collect();

    let dirs = if workspace.dapps.is_dir() {
        list_dirs(&workspace.dapps)
            .with_context(|| format!("failed to list {}", workspace.dapps.display()))?
    } else {
        debug!("workspace"; "{} not found, no dapps", workspace.dapps.display());
        Vec::new()
    };
    for dir in dirs {
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if builds.iter().any(|b| b.build.name == name) {
            debug!("workspace"; "dapp {} is configured explicitly", name);
            continue;
        }
        builds.push(WorkspaceBuild {
            build: SubBuild::new(&name, &config.root, workspace.dapp_command_for(&name)),
            watch: vec![dir.join("src"), dir.join(DESCRIPTOR_FILE)],
            then: Vec::new(),
        });
    }

    for build in &builds {
        if let Some(unknown) = build
            .then
            .iter()
            .find(|name| !builds.iter().any(|b| &b.build.name == *name))
        {
            bail!("build `{}` chains to unknown build `{}`", build.build.name, unknown);
        }
    }
    Ok(builds)
}

/// Watch targets for `builds`, with every `then` link registered on the
/// coordinator. Builds without watch paths only run when chained.
fn watch_targets(
    builds: Vec<WorkspaceBuild>,
    coordinator: &RebuildCoordinator,
) -> Vec<WatchTarget> {
    let shared: FxHashMap<String, Arc<dyn Build>> = builds
        .iter()
        .map(|b| {
            let build: Arc<dyn Build> = Arc::new(b.build.clone());
            (b.build.name.clone(), build)
        })
        .collect();

    let mut targets = Vec::new();
    for b in builds {
        for next in &b.then {
            if let Some(next) = shared.get(next) {
                coordinator.chain(&b.build.name, Arc::clone(next));
            }
        }
        if b.watch.is_empty() {
            debug!("workspace"; "{} has no watch paths", b.build.name);
            continue;
        }
        if let Some(build) = shared.get(&b.build.name) {
            targets.push(WatchTarget::new(b.watch, Arc::clone(build)));
        }
    }
    targets
}

/// Order builds so each runs after the builds that chain to it, otherwise
/// keeping their order.
fn run_order(builds: Vec<WorkspaceBuild>) -> Result<Vec<WorkspaceBuild>> {
    let index: FxHashMap<&str, usize> = builds
        .iter()
        .enumerate()
        .map(|(i, b)| (b.build.name.as_str(), i))
        .collect();
    let mut pending = vec![0usize; builds.len()];
    for b in &builds {
        for next in &b.then {
            if let Some(&i) = index.get(next.as_str()) {
                pending[i] += 1;
            }
        }
    }

    let mut order = Vec::with_capacity(builds.len());
    let mut done = vec![false; builds.len()];
    while order.len() < builds.len() {
        let Some(ready) = (0..builds.len()).find(|&i| !done[i] && pending[i] == 0) else {
            let cycle: Vec<&str> = (0..builds.len())
                .filter(|&i| !done[i])
                .map(|i| builds[i].build.name.as_str())
                .collect();
            bail!("`then` chains form a cycle: {}", cycle.join(", "));
        };
        done[ready] = true;
        order.push(ready);
        for next in &builds[ready].then {
            if let Some(&i) = index.get(next.as_str()) {
                pending[i] -= 1;
            }
        }
    }

    let mut slots: Vec<Option<WorkspaceBuild>> = builds.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Keep the builds named in `only` and the builds they chain to; all of
/// them when `only` is empty.
fn select(builds: Vec<WorkspaceBuild>, only: &[String]) -> Result<Vec<WorkspaceBuild>> {
    if only.is_empty() {
        return Ok(builds);
    }
    if let Some(unknown) = only
        .iter()
        .find(|name| !builds.iter().any(|b| &b.build.name == *name))
    {
        let known: Vec<&str> = builds.iter().map(|b| b.build.name.as_str()).collect();
        bail!("unknown build `{}` (available: {})", unknown, known.join(", "));
    }

    let mut wanted: Vec<&str> = only.iter().map(String::as_str).collect();
    let mut cursor = 0;
    while let Some(name) = wanted.get(cursor).copied() {
        cursor += 1;
        let Some(build) = builds.iter().find(|b| b.build.name == name) else {
            continue;
        };
        for next in &build.then {
            if !wanted.contains(&next.as_str()) {
                wanted.push(next);
            }
        }
    }
    let wanted: Vec<String> = wanted.into_iter().map(str::to_string).collect();

    Ok(builds
        .into_iter()
        .filter(|b| wanted.contains(&b.build.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PublishConfig, SubBuildConfig};
    use std::fs;
    use tempfile::TempDir;

    fn workspace_config(root: &std::path::Path) -> DappConfig {
        let mut config = DappConfig::default();
        config.root = root.to_path_buf();
        config.build.external_dir = root.join("external");
        config.workspace.dapps = root.join("dapps");
        config.workspace.builds.push(SubBuildConfig {
            name: "core".into(),
            cwd: root.join("core"),
            command: "npm run build".into(),
            watch: vec![PathBuf::from("src")],
            publish: Some(PublishConfig {
                files: vec![PathBuf::from("dbcp.json")],
                to: PathBuf::from("smartcontracts"),
                descriptor: None,
            }),
            then: Vec::new(),
        });
        config
    }

    fn chained(name: &str, then: &[&str]) -> SubBuildConfig {
        SubBuildConfig {
            name: name.into(),
            command: format!("echo {name}"),
            then: then.iter().map(|s| s.to_string()).collect(),
            ..SubBuildConfig::default()
        }
    }

    fn names(builds: &[WorkspaceBuild]) -> Vec<&str> {
        builds.iter().map(|b| b.build.name.as_str()).collect()
    }

    #[test]
    fn test_collect_configured_and_discovered() {
        let dir = TempDir::new().unwrap();
        for sub in ["dapps/wallet/src", "dapps/core/src", "dapps/addressbook"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let config = workspace_config(dir.path());

        let builds = collect_builds(&config).unwrap();
        let names: Vec<&str> = builds.iter().map(|b| b.build.name.as_str()).collect();

        assert_eq!(names, vec!["core", "addressbook", "wallet"]);
        assert_eq!(builds[0].watch, vec![dir.path().join("core/src")]);
        assert!(builds[0].build.publish.is_some());
        assert_eq!(
            builds[2].build.command,
            "npm run dapp-build \"dapps/wallet\""
        );
        assert_eq!(builds[2].build.cwd, dir.path());
    }

    #[test]
    fn test_missing_dapps_dir() {
        let dir = TempDir::new().unwrap();
        let builds = collect_builds(&workspace_config(dir.path())).unwrap();
        assert_eq!(builds.len(), 1);
    }

    #[test]
    fn test_select_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dapps/wallet")).unwrap();
        let config = workspace_config(dir.path());

        let selected = select(collect_builds(&config).unwrap(), &["wallet".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].build.name, "wallet");

        let err = select(collect_builds(&config).unwrap(), &["nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown build `nope`"));
    }

    #[test]
    fn test_chained_builds_run_after_trigger() {
        let dir = TempDir::new().unwrap();
        let mut config = workspace_config(dir.path());
        config.workspace.builds = vec![
            chained("copy", &[]),
            chained("bundles", &["copy"]),
            chained("bcc", &["bundles"]),
            chained("other", &[]),
        ];

        let builds = run_order(collect_builds(&config).unwrap()).unwrap();
        assert_eq!(names(&builds), vec!["bcc", "bundles", "copy", "other"]);
    }

    #[test]
    fn test_select_follows_then() {
        let dir = TempDir::new().unwrap();
        let mut config = workspace_config(dir.path());
        config.workspace.builds = vec![
            chained("bcc", &["bundles"]),
            chained("bundles", &["copy"]),
            chained("copy", &[]),
            chained("other", &[]),
        ];

        let selected = select(collect_builds(&config).unwrap(), &["bcc".to_string()]).unwrap();
        assert_eq!(names(&selected), vec!["bcc", "bundles", "copy"]);
    }

    #[test]
    fn test_unknown_then_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = workspace_config(dir.path());
        config.workspace.builds = vec![chained("bcc", &["missing"])];

        let err = collect_builds(&config).unwrap_err();
        assert!(err.to_string().contains("unknown build `missing`"));
    }

    #[test]
    fn test_then_cycle_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = workspace_config(dir.path());
        config.workspace.builds = vec![chained("a", &["b"]), chained("b", &["a"])];

        let err = run_order(collect_builds(&config).unwrap()).unwrap_err();
        assert!(err.to_string().contains("cycle: a, b"));
    }

    #[test]
    fn test_watch_targets_skip_chain_only_builds() {
        let dir = TempDir::new().unwrap();
        let mut config = workspace_config(dir.path());
        let mut bcc = chained("bcc", &["bundles"]);
        bcc.watch = vec![PathBuf::from("src")];
        config.workspace.builds = vec![bcc, chained("bundles", &[])];

        let coordinator = RebuildCoordinator::new();
        let targets = watch_targets(collect_builds(&config).unwrap(), &coordinator);

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].build.key(), "bcc");
    }

    #[test]
    #[cfg(unix)]
    fn test_one_shot_runs_chain_in_order() {
        let dir = TempDir::new().unwrap();
        let mut config = DappConfig::default();
        config.root = dir.path().to_path_buf();
        config.workspace.dapps = dir.path().join("dapps");
        for (name, then) in [("copy", vec![]), ("bcc", vec!["copy".to_string()])] {
            config.workspace.builds.push(SubBuildConfig {
                name: name.into(),
                cwd: dir.path().to_path_buf(),
                command: format!("echo {name} >> order.txt"),
                then,
                ..SubBuildConfig::default()
            });
        }

        run_workspace(&config, false, &[]).unwrap();

        let order = fs::read_to_string(dir.path().join("order.txt")).unwrap();
        assert_eq!(order, "bcc\ncopy\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_one_shot_reports_failures() {
        let dir = TempDir::new().unwrap();
        let mut config = DappConfig::default();
        config.root = dir.path().to_path_buf();
        config.workspace.dapps = dir.path().join("dapps");
        for (name, command) in [("ok", "true"), ("broken", "exit 1")] {
            config.workspace.builds.push(SubBuildConfig {
                name: name.into(),
                cwd: dir.path().to_path_buf(),
                command: command.into(),
                ..SubBuildConfig::default()
            });
        }

        let err = run_workspace(&config, false, &[]).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 builds failed: broken");
    }
}
