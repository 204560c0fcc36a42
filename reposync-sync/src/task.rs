//! Per-repository sync task.
//!
//! ```text
//! Cloning ─► BranchResolved ─► Copied ─┬─► NoChange ──┬─► CleanedUp
//!    │             │             │     └─► Published ─┤
//!    └─────────────┴─────────────┴── error/cancel ────┘
//! ```
//!
//! Every path ends in `CleanedUp`: the clone is removed whatever happened,
//! and a failure to remove it never hides the task's real result.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use reposync_core::{
    BranchPolicy, Config, FileBindings, Identity, RepositoryTarget, SyncMode, SyncProposal,
};
use reposync_forge::Forge;
use serde::Serialize;

use crate::bindings::{self, BindingFailure};
use crate::cancel::CancelSignal;
use crate::error::SyncError;
use crate::git::{GitBackend, StatusEntry};
use crate::publisher::{self, PublishRequest};
use crate::resolver;
use crate::workspace::Workspace;

// ---------------------------------------------------------------------------
// 1. States, outcomes, warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Cloning,
    BranchResolved,
    Copied,
    NoChange,
    Published,
    CleanedUp,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Cloning => "cloning",
            TaskState::BranchResolved => "branch_resolved",
            TaskState::Copied => "copied",
            TaskState::NoChange => "no_change",
            TaskState::Published => "published",
            TaskState::CleanedUp => "cleaned_up",
        };
        f.write_str(s)
    }
}

/// The piece of work a task is attempting. A failure or cancellation is
/// reported against the step in progress, not the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStep {
    Clone,
    ResolveBranch,
    CopyFiles,
    Publish,
}

impl fmt::Display for TaskStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStep::Clone => "cloning",
            TaskStep::ResolveBranch => "resolving branch",
            TaskStep::CopyFiles => "copying files",
            TaskStep::Publish => "publishing",
        };
        f.write_str(s)
    }
}

/// How a repository task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Bindings applied cleanly and nothing differs from the sync branch.
    NoChange,
    /// Changes found, but the run is a dry run.
    WouldChange,
    Published {
        mode: SyncMode,
        pr_number: u64,
        url: String,
    },
    Failed {
        step: TaskStep,
        error: String,
        cancelled: bool,
    },
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::NoChange => f.write_str("no change"),
            SyncOutcome::WouldChange => f.write_str("would change"),
            SyncOutcome::Published {
                mode: SyncMode::Create,
                pr_number,
                ..
            } => write!(f, "opened #{pr_number}"),
            SyncOutcome::Published { pr_number, .. } => write!(f, "updated #{pr_number}"),
            SyncOutcome::Failed {
                cancelled: true, ..
            } => f.write_str("cancelled"),
            SyncOutcome::Failed { .. } => f.write_str("failed"),
        }
    }
}

/// Something worth reporting that did not fail the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    /// One binding could not be copied; the others were.
    PartialCopy { binding: String, error: String },
    /// More than one open pull request matched the branch pattern.
    MultipleSyncProposals { selected: u64, ignored: Vec<u64> },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::PartialCopy { binding, error } => {
                write!(f, "binding {binding} skipped: {error}")
            }
            SyncWarning::MultipleSyncProposals { selected, ignored } => {
                let ignored = ignored
                    .iter()
                    .map(|n| format!("#{n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "several sync pull requests open, used #{selected}, ignored {ignored}")
            }
        }
    }
}

impl From<&BindingFailure> for SyncWarning {
    fn from(failure: &BindingFailure) -> Self {
        SyncWarning::PartialCopy {
            binding: failure.binding.to_string(),
            error: failure.error.clone(),
        }
    }
}

/// Everything known about one repository once its task finished.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub repository: RepositoryTarget,
    pub outcome: SyncOutcome,
    pub proposal: Option<SyncProposal>,
    pub changed_paths: Vec<StatusEntry>,
    pub warnings: Vec<SyncWarning>,
    /// Every state entered, in order.
    pub states: Vec<TaskState>,
    pub final_state: TaskState,
    pub cleanup_error: Option<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    fn new(repository: RepositoryTarget) -> Self {
        Self {
            repository,
            outcome: SyncOutcome::NoChange,
            proposal: None,
            changed_paths: Vec::new(),
            warnings: Vec::new(),
            states: Vec::new(),
            final_state: TaskState::Cloning,
            cleanup_error: None,
            duration_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Shared task inputs
// ---------------------------------------------------------------------------

/// Run-wide settings, identical for every repository.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub source_root: PathBuf,
    pub workspace_root: PathBuf,
    pub bindings: FileBindings,
    pub dry_run: bool,
    pub commit_message: String,
    pub pr_title: String,
    pub branch_policy: BranchPolicy,
    pub base_branches: Vec<String>,
    pub author: Identity,
}

impl TaskSettings {
    pub fn from_config(config: &Config, author: Identity) -> Self {
        Self {
            source_root: config.source_root.clone(),
            workspace_root: config.workspace.clone(),
            bindings: config.bindings.clone(),
            dry_run: config.dry_run,
            commit_message: config.commit_message.clone(),
            pr_title: config.pr_title.clone(),
            branch_policy: config.branch_policy.clone(),
            base_branches: config.base_branches.clone(),
            author,
        }
    }
}

/// Handles shared by every task of a run.
#[derive(Clone)]
pub struct TaskContext {
    pub forge: Arc<dyn Forge>,
    pub git: Arc<dyn GitBackend>,
    pub settings: Arc<TaskSettings>,
    pub cancel: CancelSignal,
}

// ---------------------------------------------------------------------------
// 3. State machine
// ---------------------------------------------------------------------------

pub struct SyncTask {
    target: RepositoryTarget,
    ctx: TaskContext,
    state: TaskState,
    step: TaskStep,
    trail: Vec<TaskState>,
}

impl SyncTask {
    pub fn new(target: RepositoryTarget, ctx: TaskContext) -> Self {
        Self {
            target,
            ctx,
            state: TaskState::Cloning,
            step: TaskStep::Clone,
            trail: Vec::new(),
        }
    }

    /// Drive the task to `CleanedUp`. Never fails: errors end up in the
    /// report's outcome.
    pub async fn run(mut self) -> SyncReport {
        let started = Instant::now();
        let mut report = SyncReport::new(self.target.clone());
        let mut workspace = None;

        let outcome = match self.drive(&mut workspace, &mut report).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    repository = %self.target,
                    step = %self.step,
                    state = %self.state,
                    error = %err,
                    "sync failed"
                );
                SyncOutcome::Failed {
                    step: self.step,
                    error: err.to_string(),
                    cancelled: err.is_cancelled(),
                }
            }
        };

        if let Some(mut workspace) = workspace {
            if let Err(err) = workspace.cleanup() {
                tracing::warn!(
                    repository = %self.target,
                    path = %workspace.path().display(),
                    error = %err,
                    "cannot remove workspace"
                );
                report.cleanup_error = Some(err.to_string());
            }
        }
        self.enter(TaskState::CleanedUp);

        report.outcome = outcome;
        report.final_state = self.state;
        report.states = self.trail;
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            repository = %report.repository,
            outcome = %report.outcome,
            duration_ms = report.duration_ms,
            "repository done"
        );
        report
    }

    async fn drive(
        &mut self,
        workspace: &mut Option<Workspace>,
        report: &mut SyncReport,
    ) -> Result<SyncOutcome, SyncError> {
        let ctx = self.ctx.clone();
        let settings = ctx.settings.as_ref();
        let target = self.target.clone();

        self.enter(TaskState::Cloning);
        self.begin(TaskStep::Clone);
        self.check_cancelled()?;
        let repo = workspace
            .insert(Workspace::prepare(&settings.workspace_root, &target)?)
            .path()
            .to_path_buf();
        self.guarded(async {
            ctx.git
                .clone_repository(&target, &repo)
                .await
                .map_err(SyncError::Clone)
        })
        .await?;

        self.begin(TaskStep::ResolveBranch);
        let resolution = self
            .guarded(async {
                let resolution = resolver::resolve(
                    ctx.forge.as_ref(),
                    &target,
                    &settings.branch_policy,
                    Utc::now(),
                )
                .await?;
                resolver::checkout_branch(ctx.git.as_ref(), &repo, &resolution.proposal).await?;
                Ok::<_, SyncError>(resolution)
            })
            .await?;
        report.warnings.extend(resolution.warning);
        let proposal = resolution.proposal;
        report.proposal = Some(proposal.clone());
        tracing::info!(
            repository = %target,
            branch = %proposal.branch_name,
            mode = %proposal.mode,
            "sync branch resolved"
        );
        self.enter(TaskState::BranchResolved);

        // Local copy: not raced, so no blocking writer outlives the workspace.
        self.begin(TaskStep::CopyFiles);
        self.check_cancelled()?;
        let copied = bindings::apply_bindings(
            ctx.git.as_ref(),
            &settings.bindings,
            &settings.source_root,
            &repo,
        )
        .await?;
        report
            .warnings
            .extend(copied.failures.iter().map(SyncWarning::from));
        report.changed_paths = copied.changes.clone();
        self.enter(TaskState::Copied);

        if !copied.has_changes() {
            self.enter(TaskState::NoChange);
            return Ok(SyncOutcome::NoChange);
        }
        if settings.dry_run {
            tracing::info!(
                repository = %target,
                changed = copied.changes.len(),
                "[dry-run] would publish changes"
            );
            self.enter(TaskState::NoChange);
            return Ok(SyncOutcome::WouldChange);
        }

        self.begin(TaskStep::Publish);
        let published = self
            .guarded(async {
                publisher::publish(
                    ctx.git.as_ref(),
                    ctx.forge.as_ref(),
                    &repo,
                    PublishRequest {
                        target: &target,
                        proposal: &proposal,
                        commit_message: &settings.commit_message,
                        pr_title: &settings.pr_title,
                        author: &settings.author,
                        base_branches: &settings.base_branches,
                    },
                    Utc::now(),
                )
                .await
                .map_err(SyncError::from)
            })
            .await?;
        self.enter(TaskState::Published);
        Ok(SyncOutcome::Published {
            mode: published.mode,
            pr_number: published.pr_number,
            url: published.url,
        })
    }

    fn enter(&mut self, state: TaskState) {
        tracing::info!(repository = %self.target, state = %state, "state");
        self.state = state;
        self.trail.push(state);
    }

    fn begin(&mut self, step: TaskStep) {
        tracing::debug!(repository = %self.target, step = %step, "step");
        self.step = step;
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(SyncError::Cancelled { step: self.step });
        }
        Ok(())
    }

    /// Race `step` against cancellation. Dropping `step` kills any git child
    /// process it was waiting on.
    async fn guarded<T, F>(&self, step: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        let mut cancel = self.ctx.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled { step: self.step }),
            result = step => result,
        }
    }
}
