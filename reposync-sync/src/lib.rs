//! # reposync-sync
//!
//! Per-repository sync tasks and the run pipeline.
//!
//! Call [`pipeline::run`] with a loaded [`reposync_core::Config`], a
//! [`reposync_forge::Forge`] and a [`GitBackend`] to sync every configured
//! repository, or build a single [`SyncTask`] for one repository.

pub mod bindings;
pub mod cancel;
pub mod error;
pub mod git;
pub mod pipeline;
pub mod publisher;
pub mod resolver;
pub mod task;
pub mod workspace;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{CopyError, GitError, PublishError, ResolutionError, RunError, SyncError};
pub use git::{ChangeKind, GitBackend, GitCli, StatusEntry};
pub use pipeline::{run, RunSummary};
pub use task::{
    SyncOutcome, SyncReport, SyncTask, SyncWarning, TaskContext, TaskSettings, TaskState,
    TaskStep,
};
