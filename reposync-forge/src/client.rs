//! Forge trait and the plain data it exchanges.
//!
//! Everything the sync core needs from the pull request API goes through
//! [`Forge`]. Implementations own pagination and rate-limit handling so
//! callers see each method as one blocking call.

use async_trait::async_trait;
use reposync_core::Identity;
use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

/// Pull request state filter for listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullRequestState {
    #[default]
    Open,
    Closed,
    All,
}

/// The two fields of a pull request the resolver looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHead {
    pub number: u64,
    pub head_branch: String,
}

impl PullRequestHead {
    pub fn new(number: u64, head_branch: impl Into<String>) -> Self {
        Self {
            number,
            head_branch: head_branch.into(),
        }
    }
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub base: String,
    pub head: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedComment {
    pub url: String,
}

/// The account the token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeUser {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ForgeUser {
    /// Commit identity for this account.
    ///
    /// Accounts with a private email get GitHub's noreply address so commits
    /// are still attributed to them.
    pub fn commit_identity(&self) -> Identity {
        let email = self
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{}+{}@users.noreply.github.com", self.id, self.login));
        Identity::new(self.login.clone(), email)
    }
}

/// Pull request API used by the sync core.
///
/// Implementations must be `Send + Sync`: one handle is shared by every
/// repository task of a run.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Every pull request of `owner/repo` in `state`, all pages.
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: PullRequestState,
    ) -> Result<Vec<PullRequestHead>, ForgeError>;

    /// Open a pull request from `request.head` into `request.base`.
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<CreatedPullRequest, ForgeError>;

    /// Post a comment on an issue or pull request.
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<CreatedComment, ForgeError>;

    /// The authenticated account.
    async fn authenticated_user(&self) -> Result<ForgeUser, ForgeError>;
}
