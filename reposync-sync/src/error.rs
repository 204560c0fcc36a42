//! Error types for reposync-sync.
//!
//! Every per-repository failure is a [`SyncError`]. It is recorded on the
//! repository's report and never aborts sibling repositories. [`RunError`]
//! covers the few failures that stop a whole run before any task starts.

use std::path::PathBuf;

use thiserror::Error;

use reposync_forge::ForgeError;

use crate::task::TaskStep;

/// A `git` invocation that could not be run or did not succeed.
///
/// Command lines and stderr are stored with credentials already redacted.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("cannot run `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from `git {command}`: {detail}")]
    Output { command: String, detail: String },
}

/// Failure while picking the branch to push to.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("listing pull requests: {0}")]
    Forge(#[from] ForgeError),

    #[error("preparing local branch '{branch}': {source}")]
    Branch {
        branch: String,
        #[source]
        source: GitError,
    },
}

/// Failure while applying bindings and detecting changes.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Every binding failed, so there is nothing meaningful to compare.
    #[error("not able to copy any file ({failures} binding(s) failed)")]
    NothingCopied { failures: usize },

    #[error("reading working tree status: {0}")]
    Status(#[source] GitError),

    #[error("copy worker stopped unexpectedly: {detail}")]
    Worker { detail: String },
}

/// Failure while committing, pushing or talking to the forge about the
/// result.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("staging changes: {0}")]
    Stage(#[source] GitError),

    #[error("committing changes: {0}")]
    Commit(#[source] GitError),

    #[error("pushing branch '{branch}': {source}")]
    Push {
        branch: String,
        #[source]
        source: GitError,
    },

    #[error("looking up base branch: {0}")]
    BaseLookup(#[source] GitError),

    #[error("none of the base branches [{}] exist and the remote has no default branch", .candidates.join(", "))]
    NoBaseBranch { candidates: Vec<String> },

    #[error("opening pull request: {0}")]
    CreatePullRequest(#[source] ForgeError),

    #[error("commenting on pull request #{pr_number}: {source}")]
    Comment {
        pr_number: u64,
        #[source]
        source: ForgeError,
    },
}

/// Why a single repository task failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("preparing workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cloning repository: {0}")]
    Clone(#[source] GitError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Copy(#[from] CopyError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("cancelled while {step}")]
    Cancelled { step: TaskStep },
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled { .. })
    }
}

/// Failures that prevent a run from starting.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("resolving commit identity: {0}")]
    Identity(#[source] ForgeError),

    #[error("preparing workspace root {path}: {source}")]
    WorkspaceRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Workspace`].
pub(crate) fn workspace_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Workspace {
        path: path.into(),
        source,
    }
}
