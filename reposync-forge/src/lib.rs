//! Pull request API client for reposync
//!
//! The sync core talks to the forge only through the [`Forge`] trait, so
//! tests can swap in an in-memory implementation.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │             Forge trait              │
//! │  - list_pull_requests()              │
//! │  - create_pull_request()             │
//! │  - create_comment()                  │
//! │  - authenticated_user()              │
//! └──────────────────────────────────────┘
//!                    │
//!                    ▼
//!          ┌──────────────────┐
//!          │  OctocrabForge   │  pagination + secondary
//!          │  (GitHub REST)   │  rate-limit backoff
//!          └──────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod octocrab_forge;
pub mod retry;

/// Default forge host (public GitHub)
pub const DEFAULT_HOST: &str = "github.com";

pub use client::{
    CreatedComment, CreatedPullRequest, Forge, ForgeUser, NewPullRequest, PullRequestHead,
    PullRequestState,
};
pub use error::ForgeError;
pub use octocrab_forge::OctocrabForge;
pub use retry::RetryPolicy;
