//! HTML build. The entry files are copied to the output root with their
//! script reference block rewritten for the current environment:
//!
//! ```html
//! <!-- build:js -->
//! <script src="anything here is replaced"></script>
//! <!-- endbuild -->
//! ```
//!
//! Production injects exactly one reference to the minified bundle;
//! development injects the full unminified list, in compile order, pointing
//! into `scripts/full/`. A `build:css` block, when present, is rewritten to
//! the primary stylesheet. In development a live-reload client snippet is
//! injected before `</body>` so the browser refreshes when the reload
//! channel fires.

use std::fs;

use crate::config::BuildContext;
use crate::error::PatternError;
use crate::registry::{Outcome, PipelineResult};

const BUILD_JS: &str = "<!-- build:js -->";
const BUILD_CSS: &str = "<!-- build:css -->";
const ENDBUILD: &str = "<!-- endbuild -->";

pub fn run(ctx: &BuildContext) -> PipelineResult {
    let entries = ctx.paths.html.resolve(&ctx.paths.root)?;
    let out_dir = ctx.paths.out_dir();

    let mut written = Vec::new();

    for entry in entries {
        let text = match fs::read_to_string(ctx.paths.root.join(&entry.path)) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(file = %entry.path, "couldn't read html entry: {err}");
                continue;
            }
        };

        let text = rewrite(&text, ctx)?;
        let dest = out_dir.join(&entry.rel);

        super::write_output(&dest, text.as_bytes())?;
        written.push(dest);
    }

    Ok(Outcome::wrote(written))
}

fn rewrite(html: &str, ctx: &BuildContext) -> Result<String, PatternError> {
    let scripts: String = script_srcs(ctx)?
        .iter()
        .map(|src| format!(r#"<script src="{src}"></script>"#))
        .collect::<Vec<_>>()
        .join("\n");

    let stylesheet = format!(
        r#"<link rel="stylesheet" href="css/{}.css">"#,
        ctx.paths.css_filename
    );

    let mut html = replace_block(html, BUILD_JS, &scripts);
    html = replace_block(&html, BUILD_CSS, &stylesheet);

    if !ctx.env.is_prod() {
        html = inject_reload_snippet(&html, ctx.ports.livereload);
    }

    Ok(html)
}

/// The script sources to reference, keyed on the environment. Development
/// lists every file of the compile set so execution order matches the
/// concatenated production bundle.
fn script_srcs(ctx: &BuildContext) -> Result<Vec<String>, PatternError> {
    if ctx.env.is_prod() {
        return Ok(vec![format!("scripts/{}.min.js", ctx.paths.js_filename)]);
    }

    let sources = ctx.paths.scripts_compile.resolve(&ctx.paths.root)?;
    Ok(sources
        .iter()
        .map(|source| format!("scripts/full/{}", source.rel))
        .collect())
}

/// Replace everything from `open` through the closing marker, inclusive.
/// Html without the block passes through unchanged.
fn replace_block(html: &str, open: &str, replacement: &str) -> String {
    let Some(start) = html.find(open) else {
        return html.to_string();
    };
    let Some(end) = html[start..].find(ENDBUILD) else {
        tracing::warn!("unterminated {open} block, leaving it as is");
        return html.to_string();
    };

    let mut out = String::with_capacity(html.len());
    out.push_str(&html[..start]);
    out.push_str(replacement);
    out.push_str(&html[start + end + ENDBUILD.len()..]);
    out
}

fn inject_reload_snippet(html: &str, port: u16) -> String {
    let snippet = format!(
        "<script>\n\
         new WebSocket(\"ws://localhost:{port}/\").onmessage = () => location.reload();\n\
         </script>\n"
    );

    match html.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..at]);
            out.push_str(&snippet);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BuildEnv, Ports, ProjectPaths};
    use camino::Utf8Path;

    const PAGE: &str = "<html><body>\n\
         <!-- build:js -->\n\
         <script src=\"placeholder.js\"></script>\n\
         <!-- endbuild -->\n\
         </body></html>";

    fn context(env: BuildEnv, root: &Utf8Path) -> BuildContext {
        let paths = ProjectPaths::with_root(root).unwrap();
        BuildContext::new(env, paths, Ports::default())
    }

    #[test]
    fn prod_emits_exactly_one_minified_reference() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(BuildEnv::Prod, Utf8Path::from_path(dir.path()).unwrap());

        let html = rewrite(PAGE, &ctx).unwrap();

        assert_eq!(html.matches("<script src=").count(), 1);
        assert!(html.contains(r#"<script src="scripts/main.min.js"></script>"#));
        assert!(!html.contains("placeholder.js"));
    }

    #[test]
    fn dev_never_references_the_minified_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("src/scripts")).unwrap();
        std::fs::write(root.join("src/scripts/main.js"), "var x = 1;").unwrap();

        let ctx = context(BuildEnv::Dev, root);
        let html = rewrite(PAGE, &ctx).unwrap();

        assert!(html.contains(r#"<script src="scripts/full/main.js"></script>"#));
        assert!(!html.contains("main.min.js"));
    }

    #[test]
    fn dev_injects_the_reload_snippet_before_body_close() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(BuildEnv::Dev, Utf8Path::from_path(dir.path()).unwrap());

        let html = rewrite(PAGE, &ctx).unwrap();
        let snippet = html.find("new WebSocket").unwrap();
        let body_close = html.rfind("</body>").unwrap();

        assert!(snippet < body_close);
        assert!(html.contains("ws://localhost:35729/"));
    }

    #[test]
    fn html_without_markers_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(BuildEnv::Prod, Utf8Path::from_path(dir.path()).unwrap());

        let page = "<html><body><p>hi</p></body></html>";
        assert_eq!(rewrite(page, &ctx).unwrap(), page);
    }
}
