//! Compile stage.
//!
//! Precondition: `tsconfig.json` at the unit root. Without it the stage is
//! skipped. With it, a rewritten copy is placed in `.tmp` so the compiler
//! reads the staged (inlined) sources and writes into `build`:
//!
//! ```text
//! compilerOptions.rootDir = <root>/.tmp
//! compilerOptions.baseUrl = <root>/.tmp
//! compilerOptions.outDir  = <root>/build
//! include                 = ["**/*.ts"]
//! exclude                 = <original exclude> + "**/*.spec.ts"
//! ```
//!
//! Plain `.js` sources are copied from `src` into `build` afterwards, so
//! they take precedence over compiled output of the same name.

use super::Compiler;
use crate::pipeline::{Outcome, StageError};
use crate::unit::{BuildUnit, TSCONFIG_FILE, read_tsconfig};
use crate::{log, stager};
use serde_json::{Map, Value, json};
use std::fs;

/// Run the compile stage.
///
/// With `tolerate_errors`, a compiler that runs but reports errors is logged
/// and the build continues with whatever it emitted.
pub fn run(
    unit: &BuildUnit,
    compiler: &dyn Compiler,
    tolerate_errors: bool,
) -> Result<Outcome, StageError> {
    let outcome = match read_tsconfig(&unit.root)? {
        None => {
            log!("compile"; "{} not found, compiler will not run", TSCONFIG_FILE);
            Outcome::Skipped(format!("no {TSCONFIG_FILE}"))
        }
        Some(tsconfig) => {
            let project = unit.tmp.join(TSCONFIG_FILE);
            fs::create_dir_all(&unit.tmp).map_err(StageError::io(&unit.tmp))?;
            let content = serde_json::to_string_pretty(&project_config(unit, tsconfig))
                .unwrap_or_default();
            fs::write(&project, content).map_err(StageError::io(&project))?;

            match compiler.compile(&project, &unit.root) {
                Ok(()) => Outcome::Succeeded,
                Err(StageError::ToolFailure { tool, message }) if tolerate_errors => {
                    log!("compile"; "{} reported errors, continuing", tool);
                    for line in message.lines().filter(|l| !l.trim().is_empty()) {
                        log!("compile"; "{}", line);
                    }
                    Outcome::Succeeded
                }
                Err(err) => return Err(err),
            }
        }
    };

    stager::copy_matching(&unit.src, &unit.build, &["js"])?;
    Ok(outcome)
}

/// The unit's tsconfig pointed at the staged tree.
pub fn project_config(unit: &BuildUnit, tsconfig: Value) -> Value {
    let mut config = match tsconfig {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let tmp = unit.tmp.to_string_lossy().to_string();
    let build = unit.build.to_string_lossy().to_string();

    let options = config
        .entry("compilerOptions")
        .or_insert_with(|| Value::Object(Map::new()));
    if !options.is_object() {
        *options = Value::Object(Map::new());
    }
    if let Some(options) = options.as_object_mut() {
        options.insert("rootDir".into(), Value::String(tmp.clone()));
        options.insert("baseUrl".into(), Value::String(tmp));
        options.insert("outDir".into(), Value::String(build));
    }

    // relative `extends` would now resolve against .tmp
    let extends = match config.get("extends") {
        Some(Value::String(base)) if base.starts_with('.') => Some(unit.root.join(base)),
        _ => None,
    };
    if let Some(absolute) = extends {
        config.insert(
            "extends".into(),
            Value::String(absolute.to_string_lossy().to_string()),
        );
    }

    let mut exclude: Vec<Value> = unit.excludes.iter().cloned().map(Value::String).collect();
    exclude.push(json!("**/*.spec.ts"));

    config.remove("files");
    config.insert("include".into(), json!(["**/*.ts"]));
    config.insert("exclude".into(), Value::Array(exclude));

    Value::Object(config)
}
