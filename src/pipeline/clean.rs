//! Cleanup tasks. Each one removes a named output subdirectory without
//! reading its contents, so a rebuild can never leave stale artifacts
//! behind. The scheduler orders every cleanup before its corresponding
//! build pipeline.

use std::fs;

use crate::config::BuildContext;
use crate::registry::{Outcome, PipelineResult};

pub fn remove(ctx: &BuildContext, subdir: &str) -> PipelineResult {
    let dir = ctx.paths.out_dir().join(subdir);

    match fs::remove_dir_all(&dir) {
        Ok(()) => tracing::debug!(dir = %dir, "removed output directory"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    Ok(Outcome::empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BuildContext, BuildEnv, Ports, ProjectPaths};
    use camino::Utf8Path;

    #[test]
    fn removes_stale_output_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let paths = ProjectPaths::with_root(root).unwrap();
        let ctx = BuildContext::new(BuildEnv::Dev, paths, Ports::default());

        let stale = root.join("public/css/stale.css");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "body {}").unwrap();

        remove(&ctx, "css").unwrap();
        assert!(!stale.exists());

        // Second removal is a no-op, not an error.
        remove(&ctx, "css").unwrap();
    }
}
