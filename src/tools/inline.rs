//! Template and style inlining.
//!
//! Rewrites component metadata in staged `.ts` files so the compiled output
//! carries its resources:
//!
//! ```text
//! templateUrl: './list.html'        →  template: "<ul>...</ul>"
//! styleUrls: ['./list.css']         →  styles: ["ul{...}"]
//! moduleId: module.id,              →  (removed)
//! ```
//!
//! Resource paths are relative to the `.ts` file.

use crate::pipeline::{Outcome, StageError};
use crate::utils::path::walk::collect_with_ext;
use regex::{Captures, Regex};
use std::{
    fs,
    path::Path,
    sync::LazyLock,
};

static TEMPLATE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"templateUrl\s*:\s*['"`]([^'"`]+)['"`]"#).expect("valid templateUrl regex")
});

static STYLE_URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"styleUrls\s*:\s*\[([^\]]*)\]").expect("valid styleUrls regex"));

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"`]([^'"`]+)['"`]"#).expect("valid quoted regex"));

static MODULE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*moduleId\s*:\s*module\.id\s*,?").expect("valid moduleId regex"));

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\n\r]\s*)+").expect("valid line break regex"));

/// Inline resources into every `.ts` file below `dir`.
///
/// Returns `Skipped` when there are no `.ts` files.
pub fn inline_dir(dir: &Path) -> Result<Outcome, StageError> {
    let files = collect_with_ext(dir, &["ts"]);
    if files.is_empty() {
        return Ok(Outcome::Skipped("no TypeScript sources".into()));
    }

    let mut rewritten = 0;
    for file in &files {
        let content = fs::read_to_string(file).map_err(StageError::io(file))?;
        let base = file.parent().unwrap_or(dir);
        let inlined = inline_source(&content, base)?;
        if inlined != content {
            fs::write(file, inlined).map_err(StageError::io(file))?;
            rewritten += 1;
        }
    }

    crate::debug!("inline"; "rewrote {} of {} files", rewritten, files.len());
    Ok(Outcome::Succeeded)
}

/// Inline the resources referenced by one source text.
pub fn inline_source(content: &str, base: &Path) -> Result<String, StageError> {
    let content = replace_fallible(&TEMPLATE_URL, content, |caps| {
        let template = read_resource(base, &caps[1])?;
        Ok(format!("template: {}", json_string(&template)))
    })?;

    let content = replace_fallible(&STYLE_URLS, &content, |caps| {
        let styles = QUOTED
            .captures_iter(&caps[1])
            .map(|url| read_resource(base, &url[1]).map(|style| json_string(&style)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("styles: [{}]", styles.join(",")))
    })?;

    Ok(MODULE_ID.replace_all(&content, "").into_owned())
}

fn read_resource(base: &Path, url: &str) -> Result<String, StageError> {
    let path = base.join(url);
    let content = fs::read_to_string(&path).map_err(StageError::io(&path))?;
    Ok(LINE_BREAKS.replace_all(&content, " ").into_owned())
}

fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// `Regex::replace_all` with a replacer that can fail.
fn replace_fallible(
    re: &Regex,
    text: &str,
    mut replace: impl FnMut(&Captures) -> Result<String, StageError>,
) -> Result<String, StageError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&text[last..m.start()]);
        out.push_str(&replace(&caps)?);
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inline_template() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("list.html"), "<ul>\n  <li class=\"x\">a</li>\n</ul>\n").unwrap();

        let out = inline_source("@Component({ templateUrl: './list.html' })", dir.path()).unwrap();
        assert_eq!(
            out,
            r#"@Component({ template: "<ul> <li class=\"x\">a</li> </ul> " })"#
        );
    }

    #[test]
    fn test_inline_styles_and_module_id() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/a.css"), "a{color:red}").unwrap();
        fs::write(dir.path().join("css/b.css"), "b{color:blue}").unwrap();

        let src = "@Component({\n  moduleId: module.id,\n  styleUrls: ['css/a.css', \"css/b.css\"]\n})";
        let out = inline_source(src, dir.path()).unwrap();
        assert_eq!(
            out,
            "@Component({\n  styles: [\"a{color:red}\",\"b{color:blue}\"]\n})"
        );
    }

    #[test]
    fn test_source_without_resources_unchanged() {
        let src = "export class Plain {}";
        assert_eq!(inline_source(src, Path::new("/nowhere")).unwrap(), src);
    }

    #[test]
    fn test_missing_resource_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = inline_source("templateUrl: 'gone.html'", dir.path()).unwrap_err();
        assert!(matches!(err, StageError::Io(..)));
    }

    #[test]
    fn test_inline_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("cmp")).unwrap();
        fs::write(dir.path().join("cmp/view.html"), "<p>hi</p>").unwrap();
        fs::write(dir.path().join("cmp/view.ts"), "x = { templateUrl: 'view.html' };").unwrap();

        assert_eq!(inline_dir(dir.path()).unwrap(), Outcome::Succeeded);
        assert_eq!(
            fs::read_to_string(dir.path().join("cmp/view.ts")).unwrap(),
            "x = { template: \"<p>hi</p>\" };"
        );
    }

    #[test]
    fn test_inline_dir_without_ts() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(inline_dir(dir.path()).unwrap(), Outcome::Skipped(_)));
    }
}
