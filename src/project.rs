//! The project wiring: every task, edge, group and watch binding. This is
//! the one place that knows the whole build; pipelines know only their own
//! slice of it.
//!
//! Task graph:
//!
//! ```text
//! clean-styles ──▶ styles ─────────┐
//! clean-scripts ─▶ scripts ────────┤
//! clean-scripts ─▶ copy-scripts ───┼─▶ build ─▶ serve ─▶ watch
//! clean-images ──▶ images ─────────┤
//!                  js-lint ────────┤
//!                  htmlbuild ──────┘
//! ```
//!
//! `default` and `prod` are composites over `[build, serve, watch]`; which
//! one is requested decides the immutable [`BuildEnv`](crate::BuildEnv) the
//! context is constructed with.

use crate::config::BuildContext;
use crate::error::ConfigError;
use crate::pipeline;
use crate::registry::{Outcome, PipelineResult, TaskRegistry};
use crate::server;
use crate::watch::WatchBinding;

const BUILD_TASKS: &[&str] = &[
    "styles",
    "js-lint",
    "scripts",
    "copy-scripts",
    "images",
    "htmlbuild",
];

/// Register the full task table.
pub fn registry() -> Result<TaskRegistry, ConfigError> {
    let mut registry = TaskRegistry::new();

    registry.register("clean-styles", &[], |ctx| pipeline::clean::remove(ctx, "css"))?;
    registry.register("clean-scripts", &[], |ctx| {
        pipeline::clean::remove(ctx, "scripts")
    })?;
    registry.register("clean-images", &[], |ctx| {
        pipeline::clean::remove(ctx, "images")
    })?;

    registry.register("styles", &["clean-styles"], pipeline::styles::run)?;
    registry.register("js-lint", &[], pipeline::scripts::lint)?;
    registry.register("scripts", &["clean-scripts"], pipeline::scripts::build)?;
    registry.register("copy-scripts", &["clean-scripts"], pipeline::scripts::copy_full)?;
    registry.register("images", &["clean-images"], pipeline::images::run)?;
    registry.register("htmlbuild", &[], pipeline::html::run)?;

    registry.register_group("build", BUILD_TASKS)?;

    registry.register("serve", &["build"], |ctx| {
        server::start(ctx)?;
        Ok(Outcome::empty())
    })?;
    registry.register("watch", &["serve"], register_watches)?;

    registry.register_group("default", &["build", "serve", "watch"])?;
    registry.register_group("prod", &["build", "serve", "watch"])?;

    Ok(registry)
}

/// The watch table. Bindings are fixed once registered; the environment is
/// immutable, so there is no late-flip hazard for the styles binding.
fn register_watches(ctx: &BuildContext) -> PipelineResult {
    let paths = &ctx.paths;

    ctx.add_watch_binding(WatchBinding::new(
        paths.styles.clone(),
        &["clean-styles", "styles"],
    ));
    ctx.add_watch_binding(WatchBinding::new(
        paths.scripts_compile.clone(),
        &["clean-scripts", "js-lint", "copy-scripts", "scripts"],
    ));
    ctx.add_watch_binding(WatchBinding::new(
        paths.images.clone(),
        &["clean-images", "images"],
    ));
    ctx.add_watch_binding(WatchBinding::new(paths.html.clone(), &["htmlbuild"]));

    Ok(Outcome::empty())
}
