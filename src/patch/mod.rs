//! Regex rewrite tables.
//!
//! A patch table is an ordered list of `(pattern, replacement)` rules read
//! from TOML:
//!
//! ```toml
//! [[patch]]
//! pattern = "throw 'invalid views to insert';"
//! replacement = "viewControllers = [ ];"
//! ```
//!
//! `apply` runs every rule exactly once, in order, replacing all matches.
//! Replacements use regex replacement syntax (`$1`, `${name}`).

use crate::config::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::{fs, path::Path};

const BUNDLE_DEFAULTS: &str = include_str!("bundle.toml");
const STYLE_DEFAULTS: &str = include_str!("style.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatchFile {
    #[serde(default)]
    patch: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    pattern: String,
    #[serde(default)]
    replacement: String,
}

/// One compiled rewrite rule.
#[derive(Debug, Clone)]
pub struct PatchRule {
    pub pattern: Regex,
    pub replacement: String,
}

/// Ordered rewrite rules.
#[derive(Debug, Clone, Default)]
pub struct PatchTable {
    rules: Vec<PatchRule>,
}

impl PatchTable {
    /// Parse and compile a table.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: PatchFile = toml::from_str(content)?;
        let rules = file
            .patch
            .into_iter()
            .map(|raw| {
                let pattern = Regex::new(&raw.pattern).map_err(|err| {
                    ConfigError::Validation(format!("invalid patch pattern `{}`: {err}", raw.pattern))
                })?;
                Ok(PatchRule {
                    pattern,
                    replacement: raw.replacement,
                })
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Read a table from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_toml(&content)
    }

    /// The embedded bundle table.
    pub fn bundle_defaults() -> Result<Self, ConfigError> {
        Self::from_toml(BUNDLE_DEFAULTS)
    }

    /// The embedded stylesheet table.
    pub fn style_defaults() -> Result<Self, ConfigError> {
        Self::from_toml(STYLE_DEFAULTS)
    }

    /// Bundle table from `path` when given, else the embedded one.
    pub fn bundle_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::bundle_defaults(),
        }
    }

    /// Apply all rules in order.
    pub fn apply(&self, text: &str) -> String {
        self.rules.iter().fold(text.to_string(), |acc, rule| {
            rule.pattern
                .replace_all(&acc, rule.replacement.as_str())
                .into_owned()
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_defaults_compile() {
        let table = PatchTable::bundle_defaults().unwrap();
        assert_eq!(table.len(), 9);
    }

    #[test]
    fn test_style_defaults_compile() {
        assert_eq!(PatchTable::style_defaults().unwrap().len(), 2);
    }

    #[test]
    fn test_bundle_rules_rewrite_known_snippets() {
        let table = PatchTable::bundle_defaults().unwrap();
        let input = "if (x) { throw 'invalid views to insert'; }\n\
                     ti.reject(rejectReason);\n\
                     if (shouldRunGuardsAndResolvers) {\n\
                     throw new Error('Cannot enable prod mode after platform setup.');";
        let out = table.apply(input);

        assert!(out.contains("if (x) { viewControllers = [ ]; }"));
        assert!(!out.contains("ti.reject"));
        assert!(out.contains("if (shouldRunGuardsAndResolvers && context.outlet) {"));
        assert!(!out.contains("Cannot enable prod mode"));
    }

    #[test]
    fn test_console_warn_spans_two_lines() {
        let table = PatchTable::bundle_defaults().unwrap();
        let input = "console.warn(\"You can't remove all the pages in the navigation stack. \" +\n    \"nav.pop() is probably called too many times.\", this, this.getNativeElement(), 'root page';";
        assert_eq!(table.apply(input), "return;");
    }

    #[test]
    fn test_style_rules() {
        let table = PatchTable::style_defaults().unwrap();
        let css = r#"@font-face{src:url("a.woff2") format("woff2"),url("a.woff") format("woff")}body{font-family:"Roboto","Helvetica Neue",sans-serif}"#;
        let out = table.apply(css);
        assert_eq!(
            out,
            r#"@font-face{src:url("a.woff2") format("woff2")}body{font-family:'Open Sans', sans-serif}"#
        );
    }

    #[test]
    fn test_rules_apply_in_order() {
        let table = PatchTable::from_toml(
            "[[patch]]\npattern = 'a'\nreplacement = 'b'\n\
             [[patch]]\npattern = 'b'\nreplacement = 'c'",
        )
        .unwrap();
        // second rule sees the output of the first
        assert_eq!(table.apply("ab"), "cc");
    }

    #[test]
    fn test_rule_without_match_is_noop() {
        let table = PatchTable::bundle_defaults().unwrap();
        let input = "var untouched = 1;";
        assert_eq!(table.apply(input), input);
    }

    #[test]
    fn test_replacement_groups() {
        let table =
            PatchTable::from_toml("[[patch]]\npattern = '(\\w+)=(\\w+)'\nreplacement = '$2=$1'")
                .unwrap();
        assert_eq!(table.apply("a=b"), "b=a");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PatchTable::from_toml("[[patch]]\npattern = '('").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_table() {
        let table = PatchTable::from_toml("").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.apply("x"), "x");
    }
}
