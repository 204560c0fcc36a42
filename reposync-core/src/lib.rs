//! reposync core library — domain types, configuration, errors.
//!
//! - [`types`]: repository targets, file bindings, sync proposals
//! - [`branch`]: sync branch naming rules
//! - [`config`]: YAML configuration load + validation
//! - [`error`]: [`ConfigError`]

pub mod branch;
pub mod config;
pub mod error;
pub mod types;

pub use branch::BranchPolicy;
pub use config::{Config, ForgeSettings, Overrides};
pub use error::ConfigError;
pub use types::{
    FileBinding, FileBindings, Identity, RepositoryTarget, SyncMode, SyncProposal,
};
