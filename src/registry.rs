//! Task registry and scheduler. Tasks are registered under unique string
//! names with explicit dependencies; composite (group) tasks are nodes whose
//! dependencies are their members. Scheduling resolves the dependency
//! closure of the requested task, topologically sorts it (detecting cycles
//! and unknown names as configuration errors before anything runs), then
//! executes it level by level. Tasks within a level run in parallel; every
//! pipeline owns a disjoint output subtree, so this is safe.

use std::collections::{HashMap, HashSet};

use camino::Utf8PathBuf;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::BuildContext;
use crate::error::ConfigError;

/// What a pipeline produced: the output paths it wrote in this run. A
/// non-empty outcome triggers a reload notification after the task finishes.
#[derive(Debug, Default)]
pub struct Outcome {
    pub written: Vec<Utf8PathBuf>,
}

impl Outcome {
    /// Nothing written, nothing to reload. Used by report-only tasks.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn wrote(written: Vec<Utf8PathBuf>) -> Self {
        Self { written }
    }
}

/// Result from a single executed pipeline.
pub type PipelineResult = anyhow::Result<Outcome>;

type PipelineFn = Box<dyn Fn(&BuildContext) -> PipelineResult + Send + Sync>;

enum TaskBody {
    Pipeline(PipelineFn),
    /// A composite task; running it means running its dependencies.
    Group,
}

struct Task {
    name: String,
    after: Vec<String>,
    body: TaskBody,
}

/// Summary of a finished run. Pipeline failures are logged, not propagated;
/// they show up here so callers can report them.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: Vec<String>,
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    names: HashMap<String, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline task. Dependencies may be registered later; they
    /// are validated at schedule time.
    pub fn register<F>(&mut self, name: &str, after: &[&str], body: F) -> Result<(), ConfigError>
    where
        F: Fn(&BuildContext) -> PipelineResult + Send + Sync + 'static,
    {
        self.add(name, after, TaskBody::Pipeline(Box::new(body)))
    }

    /// Register a composite task over the listed member names.
    pub fn register_group(&mut self, name: &str, members: &[&str]) -> Result<(), ConfigError> {
        self.add(name, members, TaskBody::Group)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    fn add(&mut self, name: &str, after: &[&str], body: TaskBody) -> Result<(), ConfigError> {
        if self.names.contains_key(name) {
            return Err(ConfigError::DuplicateTask(name.to_string()));
        }

        self.names.insert(name.to_string(), self.tasks.len());
        self.tasks.push(Task {
            name: name.to_string(),
            after: after.iter().map(|s| s.to_string()).collect(),
            body,
        });

        Ok(())
    }

    /// Run the named task and its dependency closure to completion.
    ///
    /// Configuration errors (unknown name, unknown dependency, cycle) abort
    /// before any pipeline runs. Pipeline failures do not: they are logged,
    /// recorded in the summary, and the rest of the run proceeds.
    pub fn run(&self, name: &str, ctx: &BuildContext) -> Result<RunSummary, ConfigError> {
        self.run_batch(&[name], ctx)
    }

    /// Run several entry points as one scheduled pass. Their dependency
    /// closures are unioned before execution, so a task shared between
    /// entries, or listed alongside one of its own dependents, executes
    /// exactly once and before everything that depends on it.
    pub fn run_batch<S: AsRef<str>>(
        &self,
        names: &[S],
        ctx: &BuildContext,
    ) -> Result<RunSummary, ConfigError> {
        let (graph, indices) = self.build_graph()?;

        // Toposort is run on the whole graph primarily to detect cycles.
        toposort(&graph, None)
            .map_err(|cycle| ConfigError::Cycle(self.tasks[graph[cycle.node_id()]].name.clone()))?;

        // The closure is everything reachable from the entry points walking
        // dependency edges backwards.
        let mut closure = HashSet::new();
        for name in names {
            let name = name.as_ref();
            let entry = *self
                .names
                .get(name)
                .ok_or_else(|| ConfigError::UnknownTask(name.to_string()))?;

            let mut dfs = Dfs::new(Reversed(&graph), indices[entry]);
            while let Some(node) = dfs.next(Reversed(&graph)) {
                closure.insert(node);
            }
        }

        self.execute(&graph, &closure, ctx)
    }

    /// Build the dependency graph, with edges pointing from a dependency to
    /// its dependents. Fails if any referenced name is unregistered.
    fn build_graph(&self) -> Result<(DiGraph<usize, ()>, Vec<NodeIndex>), ConfigError> {
        let mut graph = DiGraph::new();
        let indices: Vec<_> = (0..self.tasks.len()).map(|i| graph.add_node(i)).collect();

        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.after {
                let dep_index = *self
                    .names
                    .get(dep)
                    .ok_or_else(|| ConfigError::UnknownTask(dep.clone()))?;
                graph.add_edge(indices[dep_index], indices[i], ());
            }
        }

        Ok((graph, indices))
    }

    /// Execute the closure level by level. A level holds every task whose
    /// dependencies within the closure are already done; its members run in
    /// parallel.
    fn execute(
        &self,
        graph: &DiGraph<usize, ()>,
        closure: &HashSet<NodeIndex>,
        ctx: &BuildContext,
    ) -> Result<RunSummary, ConfigError> {
        let mut pending: HashMap<NodeIndex, usize> = closure
            .iter()
            .map(|&node| {
                let deps = graph
                    .neighbors_directed(node, Direction::Incoming)
                    .filter(|dep| closure.contains(dep))
                    .count();
                (node, deps)
            })
            .collect();

        let mut summary = RunSummary::default();

        while !pending.is_empty() {
            let mut level: Vec<NodeIndex> = pending
                .iter()
                .filter(|&(_, deps)| *deps == 0)
                .map(|(&node, _)| node)
                .collect();
            level.sort_by_key(|&node| graph[node]);

            let results: Vec<(NodeIndex, Option<String>)> = level
                .into_par_iter()
                .map(|node| {
                    let task = &self.tasks[graph[node]];
                    (node, self.run_one(task, ctx))
                })
                .collect();

            for (node, failed) in results {
                pending.remove(&node);

                for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
                    if let Some(deps) = pending.get_mut(&dependent) {
                        *deps -= 1;
                    }
                }

                match failed {
                    Some(name) => summary.failed.push(name),
                    None => summary.completed += 1,
                }
            }
        }

        Ok(summary)
    }

    /// Run a single task body; returns the task name on failure.
    fn run_one(&self, task: &Task, ctx: &BuildContext) -> Option<String> {
        let func = match &task.body {
            TaskBody::Pipeline(func) => func,
            TaskBody::Group => return None,
        };

        tracing::debug!(task = %task.name, "running");

        match func(ctx) {
            Ok(outcome) => {
                if !outcome.written.is_empty() {
                    tracing::info!(
                        task = %task.name,
                        files = outcome.written.len(),
                        "wrote output, notifying reload channel"
                    );
                    ctx.reload.notify();
                }
                None
            }
            Err(err) => {
                tracing::error!(task = %task.name, "task failed: {err:#}");
                Some(task.name.clone())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BuildContext, BuildEnv, Ports, ProjectPaths};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> BuildContext {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let paths = ProjectPaths::with_root(root).unwrap();
        BuildContext::new(BuildEnv::Dev, paths, Ports::default())
    }

    #[test]
    fn unknown_task_fails_before_running_anything() {
        let ran = std::sync::Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();

        let counter = ran.clone();
        registry
            .register("build", &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::empty())
            })
            .unwrap();

        let err = registry.run("deploy", &context()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTask(name) if name == "deploy"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register("styles", &[], |_| Ok(Outcome::empty())).unwrap();

        let err = registry
            .register("styles", &[], |_| Ok(Outcome::empty()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTask(_)));
    }

    #[test]
    fn cycles_are_a_configuration_error() {
        let mut registry = TaskRegistry::new();
        registry.register("a", &["b"], |_| Ok(Outcome::empty())).unwrap();
        registry.register("b", &["a"], |_| Ok(Outcome::empty())).unwrap();

        let err = registry.run("a", &context()).unwrap_err();
        assert!(matches!(err, ConfigError::Cycle(_)));
    }

    #[test]
    fn dependencies_run_before_dependents() {
        let order = std::sync::Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();

        for name in ["clean", "styles"] {
            let order = order.clone();
            let after: &[&str] = if name == "styles" { &["clean"] } else { &[] };
            registry
                .register(name, after, move |_| {
                    order.lock().unwrap().push(name);
                    Ok(Outcome::empty())
                })
                .unwrap();
        }

        registry.register_group("default", &["styles"]).unwrap();
        let summary = registry.run("default", &context()).unwrap();

        assert_eq!(summary.completed, 3); // clean + styles + the group itself
        assert_eq!(*order.lock().unwrap(), vec!["clean", "styles"]);
    }

    #[test]
    fn a_failing_task_does_not_abort_the_run() {
        let ran = std::sync::Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();

        registry
            .register("broken", &[], |_| anyhow::bail!("stylesheet syntax error"))
            .unwrap();

        let counter = ran.clone();
        registry
            .register("images", &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::empty())
            })
            .unwrap();

        registry.register_group("default", &["broken", "images"]).unwrap();
        let summary = registry.run("default", &context()).unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(summary.failed, vec!["broken".to_string()]);
        assert_eq!(summary.completed, 2); // images + the group itself
    }

    #[test]
    fn a_batch_runs_shared_dependencies_once() {
        let cleans = std::sync::Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();

        let counter = cleans.clone();
        registry
            .register("clean-scripts", &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::empty())
            })
            .unwrap();
        registry
            .register("copy-scripts", &["clean-scripts"], |_| Ok(Outcome::empty()))
            .unwrap();
        registry
            .register("scripts", &["clean-scripts"], |_| Ok(Outcome::empty()))
            .unwrap();

        // The cleanup is both an entry of the batch and a dependency of the
        // other two; it must not run again after they start.
        let summary = registry
            .run_batch(&["clean-scripts", "copy-scripts", "scripts"], &context())
            .unwrap();

        assert_eq!(cleans.load(Ordering::SeqCst), 1);
        assert_eq!(summary.completed, 3);
    }

    #[test]
    fn only_the_dependency_closure_runs() {
        let ran = std::sync::Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();

        let counter = ran.clone();
        registry
            .register("images", &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::empty())
            })
            .unwrap();

        let counter = ran.clone();
        registry
            .register("styles", &[], move |_| {
                counter.fetch_add(10, Ordering::SeqCst);
                Ok(Outcome::empty())
            })
            .unwrap();

        registry.run("styles", &context()).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }
}
