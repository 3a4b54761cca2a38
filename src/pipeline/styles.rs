//! Stylesheet compilation. Every non-partial SCSS/SASS source (files whose
//! name starts with `_` are partials pulled in via `@use`/`@import`) is
//! compiled to `<out>/css/`, mirroring its path relative to the styles
//! directory. In production the compiler emits compressed output, which is
//! the minification stage; in development it emits expanded output.

use std::sync::Mutex;

use grass::OutputStyle;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::BuildContext;
use crate::registry::{Outcome, PipelineResult};

pub fn run(ctx: &BuildContext) -> PipelineResult {
    let sources = ctx.paths.styles.resolve(&ctx.paths.root)?;
    let out_dir = ctx.paths.out_dir().join("css");

    let style = match ctx.env.is_prod() {
        true => OutputStyle::Compressed,
        false => OutputStyle::Expanded,
    };

    let written = Mutex::new(Vec::new());

    sources
        .into_par_iter()
        .filter(|source| !is_partial(&source.rel))
        .for_each(|source| {
            let options = grass::Options::default().style(style);
            let css = match grass::from_path(ctx.paths.root.join(&source.path), &options) {
                Ok(css) => css,
                Err(err) => {
                    // A syntax error in one stylesheet must not stop the
                    // run or the watch loop.
                    tracing::error!(file = %source.path, "stylesheet compile error:\n{err}");
                    return;
                }
            };

            let dest = out_dir.join(source.rel.with_extension("css"));
            match super::write_output(&dest, css.as_bytes()) {
                Ok(()) => written.lock().unwrap().push(dest),
                Err(err) => {
                    tracing::error!(file = %dest, "couldn't write stylesheet: {err}");
                }
            }
        });

    Ok(Outcome::wrote(written.into_inner().unwrap()))
}

fn is_partial(rel: &camino::Utf8Path) -> bool {
    rel.file_name().is_some_and(|name| name.starts_with('_'))
}
