#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod pipeline;
pub mod project;
pub mod registry;
pub mod server;
pub mod watch;

use console::style;

pub use crate::config::{BuildContext, BuildEnv, Ports, ProjectPaths};
pub use crate::error::{ConfigError, MillraceError};
pub use crate::pattern::PatternSet;
pub use crate::registry::{Outcome, PipelineResult, RunSummary, TaskRegistry};
pub use crate::watch::OverlapPolicy;

/// Run the named task and, if it registered watch bindings, stay in the
/// watch/serve loop for the rest of the process.
///
/// The requested entry decides the immutable build environment: `prod` gets
/// [`BuildEnv::Prod`], everything else [`BuildEnv::Dev`]. An unregistered
/// task name fails with a [`ConfigError`] before any pipeline runs.
pub fn run(
    task: &str,
    paths: ProjectPaths,
    ports: Ports,
    policy: OverlapPolicy,
) -> Result<(), MillraceError> {
    let env = match task {
        "prod" => BuildEnv::Prod,
        _ => BuildEnv::Dev,
    };

    eprintln!(
        "Running {} task {} in {} mode.",
        style("millrace").red(),
        style(task).green(),
        style(format!("{env:?}")).blue(),
    );

    let ctx = BuildContext::new(env, paths, ports);
    let registry = project::registry()?;

    let summary = registry.run(task, &ctx)?;
    if summary.failed.is_empty() {
        tracing::info!(tasks = summary.completed, "run finished");
    } else {
        tracing::warn!(
            tasks = summary.completed,
            failed = ?summary.failed,
            "run finished with failures"
        );
    }

    let bindings = ctx.take_watch_bindings();
    if !bindings.is_empty() {
        watch::dispatch(&registry, &ctx, &bindings, policy)?;
    }

    Ok(())
}
