//! Sync branch resolution.
//!
//! Decides whether a repository already has an open sync pull request to
//! append to, or needs a fresh branch and a new pull request.

use std::path::Path;

use chrono::{DateTime, Utc};
use reposync_core::{BranchPolicy, RepositoryTarget, SyncMode, SyncProposal};
use reposync_forge::{Forge, PullRequestHead, PullRequestState};

use crate::error::ResolutionError;
use crate::git::GitBackend;
use crate::task::SyncWarning;

/// Proposal plus anything odd noticed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub proposal: SyncProposal,
    pub warning: Option<SyncWarning>,
}

/// Pick the proposal from a list of open pull requests.
///
/// Pull requests whose head branch matches the policy are candidates; the
/// lowest number wins so repeated runs keep choosing the same one. No
/// candidate means a new branch named after `now`.
pub fn select_proposal(
    open: &[PullRequestHead],
    policy: &BranchPolicy,
    now: DateTime<Utc>,
) -> Resolution {
    let mut candidates: Vec<&PullRequestHead> = open
        .iter()
        .filter(|pr| policy.matches(&pr.head_branch))
        .collect();
    candidates.sort_by_key(|pr| pr.number);

    let Some(chosen) = candidates.first() else {
        return Resolution {
            proposal: SyncProposal::create(policy.generate(now)),
            warning: None,
        };
    };

    let warning = (candidates.len() > 1).then(|| SyncWarning::MultipleSyncProposals {
        selected: chosen.number,
        ignored: candidates[1..].iter().map(|pr| pr.number).collect(),
    });
    Resolution {
        proposal: SyncProposal::update(chosen.head_branch.clone(), chosen.number),
        warning,
    }
}

/// Query open pull requests of `target` and pick the proposal.
pub async fn resolve(
    forge: &dyn Forge,
    target: &RepositoryTarget,
    policy: &BranchPolicy,
    now: DateTime<Utc>,
) -> Result<Resolution, ResolutionError> {
    let open = forge
        .list_pull_requests(&target.owner, &target.name, PullRequestState::Open)
        .await?;
    let resolution = select_proposal(&open, policy, now);
    if let Some(SyncWarning::MultipleSyncProposals { selected, ignored }) = &resolution.warning {
        tracing::warn!(
            repository = %target,
            pr = selected,
            ignored = ?ignored,
            "several open sync pull requests, using the oldest"
        );
    }
    Ok(resolution)
}

/// Make the proposal's branch the checked-out branch of the clone at `repo`.
pub async fn checkout_branch(
    git: &dyn GitBackend,
    repo: &Path,
    proposal: &SyncProposal,
) -> Result<(), ResolutionError> {
    let branch = &proposal.branch_name;
    let result = match proposal.mode {
        SyncMode::Create => git.create_branch(repo, branch).await,
        SyncMode::Update { .. } => git.checkout_remote_branch(repo, branch).await,
    };
    result.map_err(|source| ResolutionError::Branch {
        branch: branch.clone(),
        source,
    })
}
