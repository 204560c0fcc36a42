//! Run pipeline: one task per configured repository.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use reposync_core::{Config, Identity};
use reposync_forge::Forge;
use serde::Serialize;

use crate::cancel::CancelSignal;
use crate::error::RunError;
use crate::git::GitBackend;
use crate::task::{SyncOutcome, SyncReport, SyncTask, TaskContext, TaskSettings};

/// Reports of a whole run, in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub author: Identity,
    pub reports: Vec<SyncReport>,
    pub duration_ms: u64,
}

impl RunSummary {
    fn count(&self, f: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| f(&r.outcome)).count()
    }

    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Published { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::NoChange))
    }

    pub fn would_change(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::WouldChange))
    }

    pub fn failed(&self) -> usize {
        self.count(SyncOutcome::is_failure)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Commit identity for the run: the configured author, else the account the
/// token belongs to.
pub async fn resolve_identity(config: &Config, forge: &dyn Forge) -> Result<Identity, RunError> {
    if let Some(author) = &config.author {
        return Ok(author.clone());
    }
    let user = forge
        .authenticated_user()
        .await
        .map_err(RunError::Identity)?;
    let identity = user.commit_identity();
    tracing::debug!(login = %user.login, author = %identity, "using forge identity");
    Ok(identity)
}

/// Sync every repository of `config`.
///
/// At most `config.concurrency` repositories are in flight at once. A failing
/// repository never stops the others; only problems that affect the whole
/// run are returned as errors.
pub async fn run(
    config: &Config,
    forge: Arc<dyn Forge>,
    git: Arc<dyn GitBackend>,
    cancel: CancelSignal,
) -> Result<RunSummary, RunError> {
    let started = Instant::now();
    let author = resolve_identity(config, forge.as_ref()).await?;
    fs::create_dir_all(&config.workspace).map_err(|source| RunError::WorkspaceRoot {
        path: config.workspace.clone(),
        source,
    })?;

    tracing::info!(
        repositories = config.repositories.len(),
        concurrency = config.concurrency,
        dry_run = config.dry_run,
        author = %author,
        "starting sync run"
    );

    let ctx = TaskContext {
        forge,
        git,
        settings: Arc::new(TaskSettings::from_config(config, author.clone())),
        cancel,
    };
    let reports: Vec<SyncReport> = stream::iter(config.repositories.iter().cloned())
        .map(|target| SyncTask::new(target, ctx.clone()).run())
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let summary = RunSummary {
        dry_run: config.dry_run,
        author,
        reports,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    tracing::info!(
        published = summary.published(),
        unchanged = summary.unchanged(),
        would_change = summary.would_change(),
        failed = summary.failed(),
        duration_ms = summary.duration_ms,
        "sync run complete"
    );
    Ok(summary)
}
