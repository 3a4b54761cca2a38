//! The transform pipelines. Each one matches a source pattern set, applies
//! its stages and writes under the output root; the scheduler notifies the
//! reload channel whenever a pipeline reports written output.
//!
//! A shared rule holds across all of them: one file failing a stage must not
//! abort the task run or crash the watch loop. Per-file errors are logged
//! and the file is skipped; the pipeline itself only fails on errors that
//! make the whole task meaningless (e.g. an unwritable output directory).

pub mod clean;
pub mod html;
pub mod images;
pub mod scripts;
pub mod styles;

use std::fs;

use camino::Utf8Path;

/// Write `bytes` to `path`, creating parent directories as needed.
pub(crate) fn write_output(path: &Utf8Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, bytes)
}
