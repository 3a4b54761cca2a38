use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::PatternError;
use crate::pattern::PatternSet;
use crate::server::ReloadHandle;
use crate::watch::WatchBinding;

/// The build environment, chosen once per process invocation and immutable
/// afterwards. Every pipeline reads it from the [`BuildContext`]; there is no
/// way to flip it mid-run, so pipelines can never race against an unset flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildEnv {
    #[default]
    Dev,
    Prod,
}

impl BuildEnv {
    pub fn is_prod(self) -> bool {
        matches!(self, BuildEnv::Prod)
    }
}

/// Ports for the static file server and the live-reload channel.
#[derive(Debug, Clone, Copy)]
pub struct Ports {
    pub http: u16,
    pub livereload: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            http: 8000,
            livereload: 35729,
        }
    }
}

/// Source pattern sets, output layout and the process-wide filename
/// constants. The defaults mirror the conventional project layout: SCSS
/// under `src/scss`, scripts under `src/scripts` with a vendored subtree,
/// third-party scripts fetched into `bower_components`, images under
/// `src/images`, one HTML entry file, everything built into `public`.
pub struct ProjectPaths {
    /// Project root all patterns are resolved against.
    pub root: Utf8PathBuf,
    /// Stylesheet sources.
    pub styles: PatternSet,
    /// Scripts in concatenation order; file order here determines script
    /// execution order in the built bundle.
    pub scripts_compile: PatternSet,
    /// Scripts to lint, minus the vendored subtree.
    pub scripts_lint: PatternSet,
    /// Raster image sources.
    pub images: PatternSet,
    /// HTML entry files.
    pub html: PatternSet,
    /// Output root served by the dev server.
    pub out: Utf8PathBuf,
    /// Base name of the concatenated script bundle.
    pub js_filename: String,
    /// Base name of the primary stylesheet.
    pub css_filename: String,
}

impl ProjectPaths {
    pub fn with_root(root: impl AsRef<Utf8Path>) -> Result<Self, PatternError> {
        let js_filename = String::from("main");

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            styles: PatternSet::new(["src/scss/**/*.scss", "src/scss/**/*.sass"])?,
            scripts_compile: PatternSet::new([
                "bower_components/jquery/dist/jquery.js".to_string(),
                "bower_components/bootstrap-sass-official/vendor/assets/javascripts/affix.js"
                    .to_string(),
                format!("src/scripts/{js_filename}.js"),
            ])?,
            scripts_lint: PatternSet::new([
                "src/scripts/**/*.js",
                "!src/scripts/vendor/**/*.js",
            ])?,
            images: PatternSet::new([
                "src/images/**/*.png",
                "src/images/**/*.jpg",
                "src/images/**/*.gif",
            ])?,
            html: PatternSet::new(["src/index.html"])?,
            out: Utf8PathBuf::from("public"),
            js_filename,
            css_filename: String::from("master"),
        })
    }

    /// Absolute (root-joined) output directory.
    pub fn out_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.out)
    }
}

/// Everything a pipeline can see while running: the immutable environment,
/// the path table, ports, and the reload handle. Also collects the watch
/// bindings registered by the `watch` task so the dispatcher loop can pick
/// them up after the entry task completes.
pub struct BuildContext {
    pub env: BuildEnv,
    pub paths: ProjectPaths,
    pub ports: Ports,
    pub reload: ReloadHandle,
    bindings: Mutex<Vec<WatchBinding>>,
}

impl BuildContext {
    pub fn new(env: BuildEnv, paths: ProjectPaths, ports: Ports) -> Self {
        Self {
            env,
            paths,
            ports,
            reload: ReloadHandle::default(),
            bindings: Mutex::new(Vec::new()),
        }
    }

    pub fn add_watch_binding(&self, binding: WatchBinding) {
        self.bindings.lock().unwrap().push(binding);
    }

    pub fn take_watch_bindings(&self) -> Vec<WatchBinding> {
        std::mem::take(&mut self.bindings.lock().unwrap())
    }
}
