//! File binding synchronizer.
//!
//! Copies every bound file or directory from the source tree into a clone
//! and asks git whether anything changed. A binding that cannot be copied is
//! a soft failure as long as at least one other binding went through.

use std::fs;
use std::io;
use std::path::Path;

use reposync_core::{FileBinding, FileBindings};
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::CopyError;
use crate::git::{GitBackend, StatusEntry};

/// A binding that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingFailure {
    pub binding: FileBinding,
    pub error: String,
}

/// Result of applying every binding to one working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Number of regular files written.
    pub files_copied: u64,
    pub failures: Vec<BindingFailure>,
}

/// What the synchronizer found after copying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingOutcome {
    /// Working tree status after the copy; empty means nothing to publish.
    pub changes: Vec<StatusEntry>,
    pub failures: Vec<BindingFailure>,
}

impl BindingOutcome {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// 1. Apply + detect
// ---------------------------------------------------------------------------

/// Copy `bindings` into `repo` and report the resulting working tree
/// changes.
///
/// With no bindings the working tree is not touched and no change is
/// reported.
pub async fn apply_bindings(
    git: &dyn GitBackend,
    bindings: &FileBindings,
    source_root: &Path,
    repo: &Path,
) -> Result<BindingOutcome, CopyError> {
    if bindings.is_empty() {
        tracing::debug!("no file bindings configured, nothing to copy");
        return Ok(BindingOutcome::default());
    }

    let copy = {
        let bindings = bindings.clone();
        let source_root = source_root.to_path_buf();
        let repo = repo.to_path_buf();
        tokio::task::spawn_blocking(move || copy_bindings(&bindings, &source_root, &repo))
    };
    let report = copy.await.map_err(|err| CopyError::Worker {
        detail: err.to_string(),
    })??;

    let changes = git.status(repo).await.map_err(CopyError::Status)?;
    tracing::debug!(
        files = report.files_copied,
        changed = changes.len(),
        "bindings applied"
    );
    Ok(BindingOutcome {
        changes,
        failures: report.failures,
    })
}

/// Copy each binding, collecting per-binding failures.
///
/// Fails with [`CopyError::NothingCopied`] only when bindings exist and
/// every one of them failed.
pub fn copy_bindings(
    bindings: &FileBindings,
    source_root: &Path,
    repo: &Path,
) -> Result<CopyReport, CopyError> {
    let mut report = CopyReport::default();
    let mut succeeded = 0usize;

    for binding in bindings {
        let src = source_root.join(&binding.source);
        let dest = repo.join(&binding.destination);
        match copy_path(&src, &dest) {
            Ok(files) => {
                tracing::debug!(binding = %binding, files, "copied");
                report.files_copied += files;
                succeeded += 1;
            }
            Err(err) => {
                tracing::warn!(binding = %binding, error = %err, "cannot copy binding, skipping it");
                report.failures.push(BindingFailure {
                    binding: binding.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    if succeeded == 0 && !bindings.is_empty() {
        return Err(CopyError::NothingCopied {
            failures: report.failures.len(),
        });
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// 2. Filesystem copy
// ---------------------------------------------------------------------------

/// Copy a file, or a directory recursively, overwriting what is at `dest`.
/// Returns the number of regular files written.
pub fn copy_path(src: &Path, dest: &Path) -> io::Result<u64> {
    let meta = fs::symlink_metadata(src).map_err(|e| annotate(src, e))?;
    if meta.is_dir() {
        copy_dir(src, dest)
    } else {
        copy_file(src, dest)?;
        Ok(1)
    }
}

fn copy_dir(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut files = 0;
    for entry in WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
    {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| annotate(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            files += 1;
        } else {
            copy_file(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

fn copy_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| annotate(parent, e))?;
    }
    if fs::symlink_metadata(dest).map(|m| m.file_type().is_symlink()).unwrap_or(false) {
        fs::remove_file(dest).map_err(|e| annotate(dest, e))?;
    }
    // fs::copy carries permission bits over.
    fs::copy(src, dest).map_err(|e| annotate(src, e))?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let link = fs::read_link(src).map_err(|e| annotate(src, e))?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| annotate(parent, e))?;
    }
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest).map_err(|e| annotate(dest, e))?;
    }
    std::os::unix::fs::symlink(&link, dest).map_err(|e| annotate(dest, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    copy_file(src, dest)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn annotate(path: &Path, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {err}", path.display()))
}
