//! Error types for reposync-forge.

use thiserror::Error;

/// All errors that can arise from forge API calls.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The client could not be built (bad host, TLS setup...).
    #[error("cannot set up forge client for {host}: {source}")]
    Setup {
        host: String,
        #[source]
        source: octocrab::Error,
    },

    /// The API rejected or failed the call.
    #[error("{operation}: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: octocrab::Error,
    },

    /// Secondary rate limit still in force after every retry.
    #[error("{operation}: secondary rate limit still active after {attempts} attempts")]
    RateLimited {
        operation: &'static str,
        attempts: u32,
    },

    /// The API answered, but without a field we rely on.
    #[error("{operation}: unexpected response: {detail}")]
    Unexpected {
        operation: &'static str,
        detail: String,
    },
}
