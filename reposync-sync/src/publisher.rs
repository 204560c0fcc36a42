//! Publishing a changed clone: commit, force push, then open a pull request
//! or comment on the existing one.

use std::path::Path;

use chrono::{DateTime, Utc};
use reposync_core::{Identity, RepositoryTarget, SyncMode, SyncProposal};
use reposync_forge::{Forge, NewPullRequest};
use serde::Serialize;

use crate::error::PublishError;
use crate::git::GitBackend;

/// Everything needed to publish one repository.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub target: &'a RepositoryTarget,
    pub proposal: &'a SyncProposal,
    pub commit_message: &'a str,
    pub pr_title: &'a str,
    pub author: &'a Identity,
    pub base_branches: &'a [String],
}

/// Where the change ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub mode: SyncMode,
    pub pr_number: u64,
    /// Pull request URL in create mode, comment URL in update mode.
    pub url: String,
}

pub async fn publish(
    git: &dyn GitBackend,
    forge: &dyn Forge,
    repo: &Path,
    request: PublishRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Published, PublishError> {
    let branch = &request.proposal.branch_name;

    git.stage_all(repo).await.map_err(PublishError::Stage)?;
    git.commit(repo, request.commit_message, request.author)
        .await
        .map_err(PublishError::Commit)?;
    git.force_push(repo, branch)
        .await
        .map_err(|source| PublishError::Push {
            branch: branch.clone(),
            source,
        })?;
    tracing::info!(repository = %request.target, branch = %branch, "pushed sync branch");

    let target = request.target;
    match request.proposal.mode {
        SyncMode::Create => {
            let base = resolve_base_branch(git, repo, request.base_branches).await?;
            let created = forge
                .create_pull_request(
                    &target.owner,
                    &target.name,
                    &NewPullRequest {
                        base: base.clone(),
                        head: branch.clone(),
                        title: request.pr_title.to_owned(),
                        body: request.commit_message.to_owned(),
                    },
                )
                .await
                .map_err(PublishError::CreatePullRequest)?;
            tracing::info!(
                repository = %target,
                pr = created.number,
                base = %base,
                url = %created.url,
                "opened pull request"
            );
            Ok(Published {
                mode: SyncMode::Create,
                pr_number: created.number,
                url: created.url,
            })
        }
        SyncMode::Update { pr_number } => {
            let body = update_comment(request.commit_message, now);
            let comment = forge
                .create_comment(&target.owner, &target.name, pr_number, &body)
                .await
                .map_err(|source| PublishError::Comment { pr_number, source })?;
            tracing::info!(repository = %target, pr = pr_number, url = %comment.url, "updated pull request");
            Ok(Published {
                mode: SyncMode::Update { pr_number },
                pr_number,
                url: comment.url,
            })
        }
    }
}

/// First of `candidates` present on the remote, else the remote's default
/// branch.
pub async fn resolve_base_branch(
    git: &dyn GitBackend,
    repo: &Path,
    candidates: &[String],
) -> Result<String, PublishError> {
    for candidate in candidates {
        if git
            .remote_branch_exists(repo, candidate)
            .await
            .map_err(PublishError::BaseLookup)?
        {
            return Ok(candidate.clone());
        }
    }
    git.remote_default_branch(repo)
        .await
        .map_err(PublishError::BaseLookup)?
        .ok_or_else(|| PublishError::NoBaseBranch {
            candidates: candidates.to_vec(),
        })
}

/// Comment body posted on an existing pull request after a new push.
pub fn update_comment(commit_message: &str, now: DateTime<Utc>) -> String {
    format!(
        "Sync branch updated on {}.\n\n{}",
        now.format("%Y-%m-%d %H:%M UTC"),
        commit_message
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn update_comment_is_dated_and_carries_the_message() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let body = update_comment("chore: sync shared files", now);
        assert_eq!(
            body,
            "Sync branch updated on 2024-03-09 14:05 UTC.\n\nchore: sync shared files"
        );
    }
}
