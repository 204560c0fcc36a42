//! Octocrab-based forge client
//!
//! Direct implementation of the [`Forge`] trait against the GitHub REST API.
//! Works for github.com and GitHub Enterprise (`https://<host>/api/v3`).

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use octocrab::params;
use octocrab::Octocrab;

use crate::client::{
    CreatedComment, CreatedPullRequest, Forge, ForgeUser, NewPullRequest, PullRequestHead,
    PullRequestState,
};
use crate::error::ForgeError;
use crate::retry::{is_secondary_rate_limit, retry_rate_limited, Retried, RetryPolicy};
use crate::DEFAULT_HOST;

const PER_PAGE: u8 = 100;

/// GitHub API client using octocrab.
#[derive(Debug, Clone)]
pub struct OctocrabForge {
    octocrab: Arc<Octocrab>,
    retry: RetryPolicy,
}

impl OctocrabForge {
    /// Wrap an already configured octocrab instance.
    pub fn new(octocrab: Arc<Octocrab>) -> Self {
        Self {
            octocrab,
            retry: RetryPolicy::default(),
        }
    }

    /// Build a token-authenticated client for `host`.
    pub fn connect(host: &str, token: &str) -> Result<Self, ForgeError> {
        let setup = |source| ForgeError::Setup {
            host: host.to_owned(),
            source,
        };
        let mut builder = Octocrab::builder().personal_token(token.to_owned());
        if host != DEFAULT_HOST {
            builder = builder
                .base_uri(format!("https://{host}/api/v3"))
                .map_err(setup)?;
        }
        let octocrab = builder.build().map_err(setup)?;
        Ok(Self::new(Arc::new(octocrab)))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, ForgeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, octocrab::Error>>,
    {
        retry_rate_limited(&self.retry, operation, is_secondary_rate_limit, call)
            .await
            .map_err(|err| match err {
                Retried::Exhausted { attempts } => ForgeError::RateLimited {
                    operation,
                    attempts,
                },
                Retried::Failed(source) => ForgeError::Api { operation, source },
            })
    }
}

#[async_trait]
impl Forge for OctocrabForge {
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: PullRequestState,
    ) -> Result<Vec<PullRequestHead>, ForgeError> {
        debug!("Fetching {:?} PRs for {}/{}", state, owner, repo);

        let mut heads = Vec::new();
        let mut page_num = 1u32;
        loop {
            let page = self
                .call("listing pull requests", || {
                    let octocrab = Arc::clone(&self.octocrab);
                    async move {
                        octocrab
                            .pulls(owner, repo)
                            .list()
                            .state(state_param(state))
                            .per_page(PER_PAGE)
                            .page(page_num)
                            .send()
                            .await
                    }
                })
                .await?;

            let page_len = page.items.len();
            heads.extend(
                page.items
                    .into_iter()
                    .map(|pr| PullRequestHead::new(pr.number, pr.head.ref_field.clone())),
            );

            if page.next.is_none() || page_len < usize::from(PER_PAGE) {
                break;
            }
            page_num += 1;
        }

        debug!("Fetched {} PRs for {}/{}", heads.len(), owner, repo);
        Ok(heads)
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<CreatedPullRequest, ForgeError> {
        debug!(
            "Creating PR {} -> {} on {}/{}",
            request.head, request.base, owner, repo
        );

        let pr = self
            .call("creating pull request", || {
                let octocrab = Arc::clone(&self.octocrab);
                async move {
                    octocrab
                        .pulls(owner, repo)
                        .create(
                            request.title.clone(),
                            request.head.clone(),
                            request.base.clone(),
                        )
                        .body(request.body.clone())
                        .maintainer_can_modify(true)
                        .send()
                        .await
                }
            })
            .await?;

        let url = pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .ok_or_else(|| ForgeError::Unexpected {
                operation: "creating pull request",
                detail: format!("pull request #{} has no html_url", pr.number),
            })?;
        Ok(CreatedPullRequest {
            number: pr.number,
            url,
        })
    }

    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<CreatedComment, ForgeError> {
        debug!("Commenting on {}/{}#{}", owner, repo, issue_number);

        let comment = self
            .call("creating comment", || {
                let octocrab = Arc::clone(&self.octocrab);
                async move {
                    octocrab
                        .issues(owner, repo)
                        .create_comment(issue_number, body)
                        .await
                }
            })
            .await?;

        Ok(CreatedComment {
            url: comment.html_url.to_string(),
        })
    }

    async fn authenticated_user(&self) -> Result<ForgeUser, ForgeError> {
        // Raw GET: the typed model does not expose the account email.
        self.call("getting authenticated user", || {
            let octocrab = Arc::clone(&self.octocrab);
            async move { octocrab.get::<ForgeUser, _, ()>("/user", None).await }
        })
        .await
    }
}

fn state_param(state: PullRequestState) -> params::State {
    match state {
        PullRequestState::Open => params::State::Open,
        PullRequestState::Closed => params::State::Closed,
        PullRequestState::All => params::State::All,
    }
}
