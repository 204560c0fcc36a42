//! Disposable per-repository working directories.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use reposync_core::RepositoryTarget;

use crate::error::{workspace_err, SyncError};

/// A directory under the workspace root reserved for one repository clone.
///
/// The directory is removed by [`Workspace::cleanup`], or on drop as a last
/// resort, whatever state the task ended in.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Reserve `<root>/<owner>/<name>`, clearing anything a previous run
    /// left behind. The directory itself is left for `git clone` to create.
    pub fn prepare(root: &Path, target: &RepositoryTarget) -> Result<Self, SyncError> {
        let path = root.join(&target.owner).join(&target.name);
        if !is_single_component(&target.owner) || !is_single_component(&target.name) {
            return Err(workspace_err(
                &path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{target}' does not map to a directory under the workspace root"),
                ),
            ));
        }
        remove_if_present(&path).map_err(|e| workspace_err(&path, e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| workspace_err(parent, e))?;
        }
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory. Safe to call more than once.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.removed {
            return Ok(());
        }
        remove_if_present(&self.path)?;
        self.removed = true;
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.removed {
            let _ = remove_if_present(&self.path);
        }
    }
}

fn is_single_component(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn target() -> RepositoryTarget {
        "acme/api".parse().expect("target")
    }

    #[test]
    fn prepare_clears_leftovers_and_cleanup_is_idempotent() {
        let root = TempDir::new().expect("root");
        let stale = root.path().join("acme/api/.git");
        fs::create_dir_all(&stale).expect("stale");

        let mut ws = Workspace::prepare(root.path(), &target()).expect("prepare");
        assert_eq!(ws.path(), root.path().join("acme/api"));
        assert!(!ws.path().exists());
        assert!(root.path().join("acme").is_dir());

        fs::create_dir_all(ws.path()).expect("clone stand-in");
        ws.cleanup().expect("cleanup");
        assert!(!ws.path().exists());
        ws.cleanup().expect("second cleanup");
    }

    #[test]
    fn drop_removes_directory() {
        let root = TempDir::new().expect("root");
        let path = {
            let ws = Workspace::prepare(root.path(), &target()).expect("prepare");
            fs::create_dir_all(ws.path().join("sub")).expect("mkdir");
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn prepare_refuses_targets_that_escape_the_root() {
        let root = TempDir::new().expect("root");
        let work = root.path().join("work");
        let victim = root.path().join("victim");
        fs::create_dir_all(&victim).expect("victim");

        for target in [
            RepositoryTarget::new("..", "victim"),
            RepositoryTarget::new("acme", ".."),
            RepositoryTarget::new("acme", "a/b"),
        ] {
            let err = Workspace::prepare(&work, &target).expect_err("escaping target");
            assert!(matches!(err, SyncError::Workspace { .. }), "{err}");
        }
        assert!(victim.is_dir());
    }
}
