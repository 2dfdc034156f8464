//! `dbcp.json` descriptor reading.
//!
//! The descriptor has a `public` and an optional `private` object. They are
//! merged shallowly (private keys win) before anything is read from them.

use crate::config::ConfigError;
use crate::pipeline::StageError;
use serde_json::{Map, Value};
use std::{fs, path::Path};

/// File name of the unit descriptor.
pub const DESCRIPTOR_FILE: &str = "dbcp.json";

/// The parts of a descriptor the build needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Declared unit name (`public.name`).
    pub name: String,
    /// Extra files to publish (`dapp.files`), relative to dist or src.
    pub files: Vec<String>,
}

impl Descriptor {
    /// Read and parse the descriptor at `path`.
    pub fn load(path: &Path) -> Result<Self, StageError> {
        if !path.is_file() {
            return Err(StageError::ConfigMissing(format!(
                "descriptor `{}` not found",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(StageError::io(path))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|err| ConfigError::Json(path.to_path_buf(), err))?;
        Self::from_value(&value).ok_or_else(|| {
            StageError::ConfigMissing(format!("`public.name` missing in `{}`", path.display()))
        })
    }

    /// Extract name and files from a parsed descriptor.
    pub fn from_value(value: &Value) -> Option<Self> {
        let merged = merge_sections(value)?;
        let name = merged.get("name")?.as_str()?.to_string();
        let files = merged
            .get("dapp")
            .and_then(|dapp| dapp.get("files"))
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self { name, files })
    }
}

/// `public` overlaid with `private`.
fn merge_sections(value: &Value) -> Option<Map<String, Value>> {
    let mut merged = value.get("public")?.as_object()?.clone();
    if let Some(private) = value.get("private").and_then(Value::as_object) {
        for (key, val) in private {
            merged.insert(key.clone(), val.clone());
        }
    }
    Some(merged)
}
