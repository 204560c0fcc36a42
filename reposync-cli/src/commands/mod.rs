pub mod check;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use reposync_core::{config, Config, Overrides};

/// Configuration file read when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "reposync.yaml";

/// Options shared by every command that loads the configuration.
///
/// Every setting can also come from the environment; without a configuration
/// file the environment alone must describe the run.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the YAML configuration file [default: reposync.yaml if present].
    #[arg(long, short, env = "REPOSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Forge API token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Forge host, e.g. `github.example.com` for GitHub Enterprise.
    #[arg(long, env = "GITHUB_URL")]
    pub host: Option<String>,

    /// Repositories to sync, one `owner/name` per line; replaces the file's list.
    #[arg(long = "repositories", value_name = "OWNER/NAME", env = "REPOSITORIES")]
    pub repositories: Vec<String>,

    /// File bindings, one `source=destination` per line; replaces the file's list.
    #[arg(long = "bindings", value_name = "SOURCE=DESTINATION", env = "FILES_BINDINGS")]
    pub bindings: Vec<String>,

    /// Commit message for sync commits.
    #[arg(long, env = "COMMIT_MESSAGE")]
    pub commit_message: Option<String>,

    /// Regular expression recognising sync branches.
    #[arg(long, value_name = "REGEX", env = "FILE_SYNC_BRANCH_REGEXP")]
    pub branch_pattern: Option<String>,

    /// Template for new sync branch names (`{date}`, `{time}`).
    #[arg(long, env = "REPOSYNC_BRANCH_TEMPLATE")]
    pub branch_template: Option<String>,

    /// Directory receiving the disposable clones.
    #[arg(long, env = "WORKSPACE")]
    pub workspace: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the configuration file with command line and environment
    /// values layered on top.
    pub fn load(&self, mut overrides: Overrides) -> Result<Config> {
        overrides.token = self.token.clone();
        overrides.host = non_blank(&self.host);
        overrides.repositories = self.repositories.clone();
        overrides.bindings = self.bindings.clone();
        overrides.commit_message = non_blank(&self.commit_message);
        overrides.branch_pattern = non_blank(&self.branch_pattern);
        overrides.branch_template = non_blank(&self.branch_template);
        overrides.workspace = self
            .workspace
            .clone()
            .filter(|p| !p.as_os_str().is_empty());

        match self.config_path() {
            Some(path) => config::load_at(&path, &overrides)
                .with_context(|| format!("invalid configuration {}", path.display())),
            None => config::from_overrides(&overrides)
                .context("invalid configuration from environment (no configuration file)"),
        }
    }

    fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        })
    }
}

/// `--dry-run[=BOOL]` / `--no-dry-run`, shared so every command reports the
/// same effective mode.
#[derive(Args, Debug)]
pub struct DryRunArgs {
    /// Only report what would change. `--dry-run=false` publishes.
    #[arg(
        long,
        env = "DRY_RUN",
        value_name = "BOOL",
        value_parser = clap::builder::BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub dry_run: Option<bool>,

    /// Publish changes (same as `--dry-run=false`).
    #[arg(long)]
    pub no_dry_run: bool,
}

impl DryRunArgs {
    pub fn value(&self) -> Option<bool> {
        if self.no_dry_run {
            Some(false)
        } else {
            self.dry_run
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}
