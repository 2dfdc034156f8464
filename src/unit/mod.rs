//! Build units.
//!
//! A build unit is one directory holding a `dbcp.json` descriptor, a `src`
//! tree and optionally a `tsconfig.json`. Building it uses three more
//! directories next to `src`:
//!
//! ```text
//! <root>/
//! ├── dbcp.json
//! ├── tsconfig.json   # optional
//! ├── src/            # input, never modified
//! ├── .tmp/           # staged copy of src, deleted after every build
//! ├── build/          # compiler output, deleted after every build
//! └── dist/           # artifacts; contents replaced, directory kept
//! ```

mod descriptor;

pub use descriptor::{DESCRIPTOR_FILE, Descriptor};

use crate::config::ConfigError;
use crate::pipeline::StageError;
use crate::utils::path::normalize_path;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const TSCONFIG_FILE: &str = "tsconfig.json";

/// One independently buildable front-end artifact.
#[derive(Debug, Clone)]
pub struct BuildUnit {
    pub root: PathBuf,
    pub src: PathBuf,
    pub tmp: PathBuf,
    pub build: PathBuf,
    pub dist: PathBuf,
    /// Declared name; names the bundle, the stylesheet and the global export.
    pub name: String,
    /// Extra files published next to the bundle.
    pub files: Vec<String>,
    /// `exclude` entries of `tsconfig.json`.
    pub excludes: Vec<String>,
}

impl BuildUnit {
    /// Open the unit rooted at `root`, reading its descriptor.
    ///
    /// Fails with `ConfigMissing` when the descriptor or its name is absent.
    pub fn open(root: &Path) -> Result<Self, StageError> {
        let root = normalize_path(root);
        let descriptor = Descriptor::load(&root.join(DESCRIPTOR_FILE))?;
        let excludes = match read_tsconfig(&root)? {
            Some(tsconfig) => tsconfig_excludes(&tsconfig),
            None => Vec::new(),
        };
        let Layout {
            src,
            tmp,
            build,
            dist,
        } = Layout::new(&root);

        Ok(Self {
            src,
            tmp,
            build,
            dist,
            name: descriptor.name,
            files: descriptor.files,
            excludes,
            root,
        })
    }

    /// Name of the published folder: the unit name without `-`.
    pub fn ens_name(&self) -> String {
        ens_name(&self.name)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// `dist/<name>.js`
    pub fn bundle_path(&self) -> PathBuf {
        self.dist.join(format!("{}.js", self.name))
    }

    /// `dist/<name>.css`
    pub fn stylesheet_path(&self) -> PathBuf {
        self.dist.join(format!("{}.css", self.name))
    }
}

/// Working directories of a unit root, known without reading the descriptor.
#[derive(Debug, Clone)]
pub struct Layout {
    pub src: PathBuf,
    pub tmp: PathBuf,
    pub build: PathBuf,
    pub dist: PathBuf,
}

impl Layout {
    pub fn new(root: &Path) -> Self {
        Self {
            src: root.join("src"),
            tmp: root.join(".tmp"),
            build: root.join("build"),
            dist: root.join("dist"),
        }
    }
}

/// Strip `-` from a unit name.
pub fn ens_name(name: &str) -> String {
    name.replace('-', "")
}

/// Read `tsconfig.json` at the unit root, if present.
pub fn read_tsconfig(root: &Path) -> Result<Option<Value>, StageError> {
    let path = root.join(TSCONFIG_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(StageError::io(&path))?;
    let value = serde_json::from_str(&content).map_err(|err| ConfigError::Json(path, err))?;
    Ok(Some(value))
}

fn tsconfig_excludes(tsconfig: &Value) -> Vec<String> {
    tsconfig
        .get("exclude")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Write a minimal unit for tests.
#[cfg(test)]
pub fn test_unit(root: &Path, name: &str) -> BuildUnit {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join(DESCRIPTOR_FILE),
        format!(r#"{{"public": {{"name": "{name}"}}}}"#),
    )
    .unwrap();
    BuildUnit::open(root).unwrap()
}
