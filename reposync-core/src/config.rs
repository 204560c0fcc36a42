//! YAML configuration.
//!
//! # File format
//!
//! ```yaml
//! repositories:
//!   - acme/api
//!   - acme/web
//! bindings:
//!   - source: shared/README.md
//!     destination: README.md
//! commit_message: "chore: sync shared files"
//! dry_run: false
//! ```
//!
//! Relative `source_root` and `workspace` paths are resolved against the
//! directory holding the configuration file. The token normally comes from
//! `GITHUB_TOKEN` through [`Overrides`] rather than the file.
//!
//! # Environment only
//!
//! Without a file, [`from_overrides`] builds the configuration from
//! [`Overrides`] alone. Repositories and bindings are then newline separated
//! lists (`owner/name` and `source=destination` lines), the way
//! `REPOSITORIES` and `FILES_BINDINGS` are usually set in CI.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::branch::{BranchPolicy, DEFAULT_BRANCH_PATTERN, DEFAULT_BRANCH_TEMPLATE};
use crate::error::ConfigError;
use crate::types::{FileBinding, FileBindings, Identity, RepositoryTarget};

pub const DEFAULT_FORGE_HOST: &str = "github.com";
pub const DEFAULT_WORKSPACE_DIR: &str = "reposync-workspace";
pub const COMMIT_SUBJECT_MAX_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// 1. Resolved configuration
// ---------------------------------------------------------------------------

/// Forge connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ForgeSettings {
    /// Host name, e.g. `github.com` or a GitHub Enterprise host.
    pub host: String,
    pub token: String,
}

impl fmt::Debug for ForgeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForgeSettings")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub repositories: Vec<RepositoryTarget>,
    pub bindings: FileBindings,
    /// Base directory binding sources are resolved against.
    pub source_root: PathBuf,
    /// Directory receiving one disposable clone per repository.
    pub workspace: PathBuf,
    pub dry_run: bool,
    pub commit_message: String,
    pub pr_title: String,
    pub branch_policy: BranchPolicy,
    /// Preferred base branches, first existing one wins.
    pub base_branches: Vec<String>,
    /// Number of repositories synchronized at the same time.
    pub concurrency: usize,
    pub forge: ForgeSettings,
    /// Commit author override; the forge identity is used when absent.
    pub author: Option<Identity>,
}

/// Values taken from the environment or the command line. `Some` (or a
/// non-empty list) wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub host: Option<String>,
    pub dry_run: Option<bool>,
    pub concurrency: Option<usize>,
    /// `owner/name` entries; each entry may hold several lines.
    pub repositories: Vec<String>,
    /// `source=destination` entries; each entry may hold several lines.
    pub bindings: Vec<String>,
    pub commit_message: Option<String>,
    pub branch_pattern: Option<String>,
    pub branch_template: Option<String>,
    /// Used as given, relative to the current directory.
    pub workspace: Option<PathBuf>,
    /// Restrict the run to these repositories (must all be configured).
    pub only: Vec<String>,
}

// ---------------------------------------------------------------------------
// 2. On-disk shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    repositories: Vec<String>,
    #[serde(default)]
    bindings: Vec<FileBinding>,
    source_root: Option<PathBuf>,
    workspace: Option<PathBuf>,
    dry_run: Option<bool>,
    commit_message: Option<String>,
    pr_title: Option<String>,
    branch_pattern: Option<String>,
    branch_template: Option<String>,
    base_branches: Option<Vec<String>>,
    concurrency: Option<usize>,
    #[serde(default)]
    forge: RawForge,
    author: Option<Identity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForge {
    host: Option<String>,
    token: Option<String>,
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load and validate the configuration file at `path`.
///
/// Returns `ConfigError::Io` if the file cannot be read and
/// `ConfigError::Parse` (with path + line context) if the YAML is malformed.
pub fn load_at(path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    resolve(raw, base_dir, overrides)
}

/// Parse configuration from a YAML string; relative paths are resolved
/// against `base_dir`.
pub fn from_yaml_str(
    yaml: &str,
    base_dir: &Path,
    overrides: &Overrides,
) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: PathBuf::from("<inline>"),
        source,
    })?;
    resolve(raw, base_dir, overrides)
}

/// Build the configuration from `overrides` alone, with no file.
pub fn from_overrides(overrides: &Overrides) -> Result<Config, ConfigError> {
    resolve(RawConfig::default(), Path::new("."), overrides)
}

fn resolve(raw: RawConfig, base_dir: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    let repository_values = if overrides.repositories.is_empty() {
        raw.repositories
    } else {
        split_lines(&overrides.repositories)
    };
    let repositories = parse_repositories(&repository_values)?;
    let repositories = select_repositories(repositories, &overrides.only)?;

    let bindings = if overrides.bindings.is_empty() {
        raw.bindings
    } else {
        split_lines(&overrides.bindings)
            .iter()
            .map(|line| line.parse())
            .collect::<Result<Vec<FileBinding>, _>>()?
    };
    if bindings.is_empty() {
        return Err(ConfigError::Missing { field: "bindings" });
    }
    let bindings = FileBindings::new(bindings)?;

    let commit_message = overrides
        .commit_message
        .clone()
        .or(raw.commit_message)
        .filter(|m| !m.trim().is_empty())
        .ok_or(ConfigError::Missing {
            field: "commit_message",
        })?;
    let commit_message = truncate_subject(commit_message.trim(), COMMIT_SUBJECT_MAX_CHARS);
    let pr_title = raw
        .pr_title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| first_line(&commit_message).to_owned());

    let branch_policy = BranchPolicy::new(
        overrides
            .branch_pattern
            .as_deref()
            .or(raw.branch_pattern.as_deref())
            .unwrap_or(DEFAULT_BRANCH_PATTERN),
        overrides
            .branch_template
            .as_deref()
            .or(raw.branch_template.as_deref())
            .unwrap_or(DEFAULT_BRANCH_TEMPLATE),
    )?;

    let base_branches = raw
        .base_branches
        .unwrap_or_else(|| vec!["main".to_owned(), "master".to_owned()]);
    if base_branches.is_empty() || base_branches.iter().any(|b| b.trim().is_empty()) {
        return Err(ConfigError::Missing {
            field: "base_branches",
        });
    }

    let concurrency = overrides.concurrency.or(raw.concurrency).unwrap_or(1);
    if concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "concurrency",
            value: "0".to_owned(),
            reason: "at least one worker is required".to_owned(),
        });
    }

    let host = overrides
        .host
        .clone()
        .or(raw.forge.host)
        .map(|h| normalize_host(&h))
        .unwrap_or_else(|| DEFAULT_FORGE_HOST.to_owned());
    if host.is_empty() {
        return Err(ConfigError::Missing { field: "forge.host" });
    }
    let token = overrides
        .token
        .clone()
        .or(raw.forge.token)
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::Missing {
            field: "GITHUB_TOKEN",
        })?;

    if let Some(author) = &raw.author {
        if author.name.trim().is_empty() || author.email.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "author.name/author.email",
            });
        }
    }

    let source_root = absolutize(base_dir, raw.source_root.unwrap_or_else(|| PathBuf::from(".")));
    let workspace = match (&overrides.workspace, raw.workspace) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dir)) => absolutize(base_dir, dir),
        (None, None) => std::env::temp_dir().join(DEFAULT_WORKSPACE_DIR),
    };

    Ok(Config {
        repositories,
        bindings,
        source_root,
        workspace,
        // Default to a dry run: nothing is pushed unless asked for.
        dry_run: overrides.dry_run.or(raw.dry_run).unwrap_or(true),
        commit_message,
        pr_title,
        branch_policy,
        base_branches,
        concurrency,
        forge: ForgeSettings { host, token },
        author: raw.author,
    })
}

// ---------------------------------------------------------------------------
// 4. Summary
// ---------------------------------------------------------------------------

impl Config {
    /// Log the effective configuration. The token is never printed.
    pub fn log_summary(&self) {
        tracing::info!("repositories:");
        for repo in &self.repositories {
            tracing::info!("  {repo}");
        }
        tracing::info!("file bindings:");
        for binding in &self.bindings {
            tracing::info!("  {binding}");
        }
        tracing::info!(dry_run = self.dry_run, "dry run");
        tracing::info!(host = %self.forge.host, token_set = !self.forge.token.is_empty(), "forge");
        tracing::info!(message = %self.commit_message, "commit message");
        tracing::info!(pattern = %self.branch_policy.pattern(), template = %self.branch_policy.template(), "sync branch");
        tracing::info!(path = %self.workspace.display(), "workspace");
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn parse_repositories(values: &[String]) -> Result<Vec<RepositoryTarget>, ConfigError> {
    let values: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(ConfigError::Missing {
            field: "repositories",
        });
    }
    let mut seen = HashSet::new();
    let mut repositories = Vec::with_capacity(values.len());
    for value in values {
        let target: RepositoryTarget = value.parse()?;
        if !seen.insert(repository_key(&target)) {
            return Err(ConfigError::DuplicateRepository {
                repository: target.full_name(),
            });
        }
        repositories.push(target);
    }
    Ok(repositories)
}

fn select_repositories(
    all: Vec<RepositoryTarget>,
    only: &[String],
) -> Result<Vec<RepositoryTarget>, ConfigError> {
    if only.is_empty() {
        return Ok(all);
    }
    let known: HashSet<String> = all.iter().map(repository_key).collect();
    let mut wanted = HashSet::new();
    for name in only {
        let target: RepositoryTarget = name.parse()?;
        let key = repository_key(&target);
        if !known.contains(&key) {
            return Err(ConfigError::UnknownRepository {
                repository: target.full_name(),
            });
        }
        wanted.insert(key);
    }
    // Keep configuration order.
    Ok(all
        .into_iter()
        .filter(|r| wanted.contains(&repository_key(r)))
        .collect())
}

/// Forge owner and repository names are case-insensitive.
fn repository_key(target: &RepositoryTarget) -> String {
    target.full_name().to_ascii_lowercase()
}

/// Flatten newline separated entries, dropping blank lines.
fn split_lines(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Keep at most `max` characters on the first line, leave the body alone.
fn truncate_subject(message: &str, max: usize) -> String {
    let (subject, rest) = match message.split_once('\n') {
        Some((subject, rest)) => (subject, Some(rest)),
        None => (message, None),
    };
    let subject: String = subject.chars().take(max).collect();
    match rest {
        Some(rest) => format!("{subject}\n{rest}"),
        None => subject,
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_owned()
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
