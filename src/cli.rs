//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::watch::OverlapPolicy;

/// Command-line arguments for `millrace`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "millrace",
    version,
    about = "Build front-end assets, serve them and rebuild on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run. `default` builds, serves and watches; `prod` does the
    /// same with minified output; `build` runs the pipelines once and exits.
    pub task: Option<String>,

    /// Project root directory.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: String,

    /// Port for the static file server.
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Port for the live-reload websocket channel.
    #[arg(long, default_value_t = 35729)]
    pub livereload_port: u16,

    /// What to do with change events that arrive while tasks are running.
    #[arg(long, value_enum, default_value_t = Overlap::Queue)]
    pub overlap: Overlap,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MILLRACE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Overlap {
    Queue,
    Coalesce,
}

impl From<Overlap> for OverlapPolicy {
    fn from(overlap: Overlap) -> Self {
        match overlap {
            Overlap::Queue => OverlapPolicy::Queue,
            Overlap::Coalesce => OverlapPolicy::Coalesce,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
