//! Filesystem watching. A [`WatchBinding`] pairs a pattern set with the task
//! names to run when a matching file changes. After the entry task finishes,
//! [`dispatch`] becomes the single event loop of the process: it drains
//! debounced change events, maps them to task batches through the binding
//! table and runs them through the registry. Task failures are logged and
//! the loop keeps going; only losing the event source ends it.

use std::collections::HashSet;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebouncedEvent, new_debouncer};

use crate::config::BuildContext;
use crate::error::WatchError;
use crate::pattern::PatternSet;
use crate::registry::TaskRegistry;

/// Pattern set plus the ordered list of task names it triggers.
pub struct WatchBinding {
    pub patterns: PatternSet,
    pub tasks: Vec<String>,
}

impl WatchBinding {
    pub fn new(patterns: PatternSet, tasks: &[&str]) -> Self {
        Self {
            patterns,
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What to do with change events that pile up while a batch is running.
/// The dispatcher is a single loop, so runs never overlap; the policy
/// decides whether queued events are processed one batch at a time or
/// merged into the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Process event batches in arrival order.
    #[default]
    Queue,
    /// Drain everything pending and merge it into a single batch.
    Coalesce,
}

/// Run the dispatcher loop. Blocks for the rest of the process under normal
/// operation.
pub fn dispatch(
    registry: &TaskRegistry,
    ctx: &BuildContext,
    bindings: &[WatchBinding],
    policy: OverlapPolicy,
) -> Result<(), WatchError> {
    let root = ctx.paths.root.canonicalize_utf8()?;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(250), None, tx)?;

    let bases: HashSet<Utf8PathBuf> = bindings
        .iter()
        .flat_map(|binding| binding.patterns.bases())
        .map(|base| root.join(base))
        .collect();

    for base in bases {
        if !base.is_dir() {
            tracing::warn!(dir = %base, "watch directory does not exist, skipping");
            continue;
        }

        tracing::info!(dir = %base, "watching");
        debouncer.watch(base.as_std_path(), RecursiveMode::Recursive)?;
    }

    loop {
        let events = match rx.recv() {
            Ok(Ok(events)) => events,
            Ok(Err(errors)) => {
                for err in errors {
                    tracing::error!("watch error: {err}");
                }
                continue;
            }
            Err(_) => return Ok(()),
        };

        let mut changed = changed_paths(&events, &root);

        if policy == OverlapPolicy::Coalesce {
            while let Ok(more) = rx.try_recv() {
                match more {
                    Ok(more) => changed.extend(changed_paths(&more, &root)),
                    Err(errors) => {
                        for err in errors {
                            tracing::error!("watch error: {err}");
                        }
                    }
                }
            }
        }

        let batch = tasks_for(&changed, bindings);
        if batch.is_empty() {
            continue;
        }

        // One scheduled pass for the whole batch: a cleanup listed in a
        // binding and pulled in again as a build task's dependency runs
        // once, before everything that depends on it.
        match registry.run_batch(&batch, ctx) {
            Ok(summary) if summary.failed.is_empty() => {}
            Ok(summary) => {
                tracing::warn!(failed = ?summary.failed, "tasks failed, still watching");
            }
            Err(err) => {
                tracing::error!("couldn't schedule watch batch: {err}");
            }
        }
    }
}

/// Root-relative paths touched by create/modify/remove events.
fn changed_paths(events: &[DebouncedEvent], root: &Utf8Path) -> Vec<Utf8PathBuf> {
    events
        .iter()
        .filter(|de| {
            matches!(
                de.event.kind,
                EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
            )
        })
        .flat_map(|de| &de.event.paths)
        .filter_map(|path| {
            let rel = path.strip_prefix(root.as_std_path()).ok()?;
            Utf8PathBuf::try_from(rel.to_path_buf()).ok()
        })
        .collect()
}

/// Map changed paths to the task names to run, preserving binding order and
/// the order of tasks within a binding; duplicates keep their first slot.
fn tasks_for(changed: &[Utf8PathBuf], bindings: &[WatchBinding]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();

    for binding in bindings {
        if !changed.iter().any(|path| binding.patterns.matches(path)) {
            continue;
        }

        for task in &binding.tasks {
            if seen.insert(task.clone()) {
                tasks.push(task.clone());
            }
        }
    }

    tasks
}

#[cfg(test)]
mod test {
    use super::*;

    fn binding(patterns: &[&str], tasks: &[&str]) -> WatchBinding {
        WatchBinding::new(PatternSet::new(patterns.to_vec()).unwrap(), tasks)
    }

    #[test]
    fn changes_map_to_bound_tasks_in_order() {
        let bindings = vec![
            binding(&["src/scss/**/*.scss"], &["clean-styles", "styles"]),
            binding(&["src/scripts/**/*.js"], &["js-lint", "scripts"]),
        ];

        let changed = vec![Utf8PathBuf::from("src/scss/master.scss")];
        assert_eq!(tasks_for(&changed, &bindings), vec!["clean-styles", "styles"]);

        let changed = vec![
            Utf8PathBuf::from("src/scss/master.scss"),
            Utf8PathBuf::from("src/scripts/main.js"),
        ];
        assert_eq!(
            tasks_for(&changed, &bindings),
            vec!["clean-styles", "styles", "js-lint", "scripts"]
        );
    }

    #[test]
    fn unmatched_changes_trigger_nothing() {
        let bindings = vec![binding(&["src/scss/**/*.scss"], &["styles"])];
        let changed = vec![Utf8PathBuf::from("README.md")];

        assert!(tasks_for(&changed, &bindings).is_empty());
    }

    #[test]
    fn overlapping_bindings_dedup_tasks() {
        let bindings = vec![
            binding(&["src/**/*.js"], &["js-lint", "scripts"]),
            binding(&["src/scripts/**/*.js"], &["scripts", "copy-scripts"]),
        ];

        let changed = vec![Utf8PathBuf::from("src/scripts/main.js")];
        assert_eq!(
            tasks_for(&changed, &bindings),
            vec!["js-lint", "scripts", "copy-scripts"]
        );
    }
}
