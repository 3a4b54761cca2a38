//! The three script pipelines.
//!
//! - `lint`: report-only static checks over the lint pattern set (which
//!   excludes the vendored subtree). Never writes files, never fails.
//! - `copy_full`: verbatim copies of the compile-ordered script list into
//!   `<out>/scripts/full/`, for development.
//! - `build`: minify each file of the compile-ordered list and concatenate
//!   them, in pattern-declared order, into
//!   `<out>/scripts/<js_filename>.min.js`. Input order determines script
//!   execution order, so the order must be stable; running the task twice
//!   on unchanged sources produces identical bytes.

use std::fs;

use crate::config::BuildContext;
use crate::registry::{Outcome, PipelineResult};

pub fn lint(ctx: &BuildContext) -> PipelineResult {
    let sources = ctx.paths.scripts_lint.resolve(&ctx.paths.root)?;
    let mut findings = 0usize;

    for source in &sources {
        let text = match fs::read_to_string(ctx.paths.root.join(&source.path)) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(file = %source.path, "couldn't read script: {err}");
                continue;
            }
        };

        for (number, line) in text.lines().enumerate() {
            for message in check_line(line) {
                tracing::warn!(file = %source.path, line = number + 1, "{message}");
                findings += 1;
            }
        }
    }

    tracing::info!(files = sources.len(), findings, "script lint report");

    Ok(Outcome::empty())
}

pub fn copy_full(ctx: &BuildContext) -> PipelineResult {
    let sources = ctx.paths.scripts_compile.resolve(&ctx.paths.root)?;
    let out_dir = ctx.paths.out_dir().join("scripts/full");

    let mut written = Vec::new();

    for source in sources {
        let bytes = match fs::read(ctx.paths.root.join(&source.path)) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(file = %source.path, "couldn't read script: {err}");
                continue;
            }
        };

        let dest = out_dir.join(&source.rel);
        super::write_output(&dest, &bytes)?;
        written.push(dest);
    }

    Ok(Outcome::wrote(written))
}

pub fn build(ctx: &BuildContext) -> PipelineResult {
    let sources = ctx.paths.scripts_compile.resolve(&ctx.paths.root)?;

    let mut parts = Vec::new();
    for source in &sources {
        match fs::read_to_string(ctx.paths.root.join(&source.path)) {
            Ok(text) => parts.push(text),
            Err(err) => {
                tracing::error!(file = %source.path, "couldn't read script: {err}");
            }
        }
    }

    let bundle = bundle(&parts);
    let dest = ctx
        .paths
        .out_dir()
        .join("scripts")
        .join(format!("{}.min.js", ctx.paths.js_filename));

    super::write_output(&dest, bundle.as_bytes())?;

    Ok(Outcome::wrote(vec![dest]))
}

/// Minify each part and join in order. Deterministic for a given input.
fn bundle(parts: &[String]) -> String {
    let minified: Vec<String> = parts
        .iter()
        .map(|text| minifier::js::minify(text).to_string())
        .collect();

    minified.join("\n")
}

fn check_line(line: &str) -> Vec<&'static str> {
    let mut messages = Vec::new();
    let trimmed = line.trim_start();

    if trimmed.starts_with("debugger") {
        messages.push("debugger statement");
    }
    if trimmed.contains("console.log(") {
        messages.push("console.log call");
    }

    messages
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bundling_is_deterministic() {
        let parts = vec![
            "function first() {\n    return 1;\n}\n".to_string(),
            "function second() {\n    return 2;\n}\n".to_string(),
        ];

        let once = bundle(&parts);
        let twice = bundle(&parts);
        assert_eq!(once, twice);
    }

    #[test]
    fn bundle_preserves_declared_order() {
        let parts = vec!["var first = 1;".to_string(), "var second = 2;".to_string()];
        let bundled = bundle(&parts);

        let first = bundled.find("first").unwrap();
        let second = bundled.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn lint_flags_debug_leftovers() {
        assert_eq!(check_line("  debugger;"), vec!["debugger statement"]);
        assert_eq!(check_line("console.log(x);"), vec!["console.log call"]);
        assert!(check_line("var x = 1;").is_empty());
    }
}
