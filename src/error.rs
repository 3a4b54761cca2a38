use thiserror::Error;

/// Errors detected while wiring or scheduling tasks. These fail fast, before
/// any pipeline runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("task '{0}' is not registered")]
    UnknownTask(String),

    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("dependency cycle involving task '{0}'")]
    Cycle(String),

    #[error("couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Errors from the watch dispatcher. Pipeline failures are not among them;
/// those are logged and the loop keeps running.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),
}

/// Errors from the dev server and the reload channel. Fatal to the serve
/// task only; the build itself is unaffected.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("couldn't bind port: {0}")]
    Bind(std::io::Error),

    #[error("failed to build runtime: {0}")]
    Runtime(std::io::Error),
}

#[derive(Debug, Error)]
pub enum MillraceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
