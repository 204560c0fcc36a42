//! Domain types for reposync.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Repository target
// ---------------------------------------------------------------------------

/// A remote repository on the forge, identified by `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryTarget {
    pub owner: String,
    pub name: String,
}

impl RepositoryTarget {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ConfigError::InvalidRepository {
            value: s.to_owned(),
        };
        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        if !is_name_part(owner) || !is_name_part(name) {
            return Err(invalid());
        }
        Ok(Self::new(owner, name))
    }
}

/// GitHub owner and repository names: `[A-Za-z0-9._-]+`, never `.` or `..`.
/// Both end up as workspace path components.
fn is_name_part(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl TryFrom<String> for RepositoryTarget {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepositoryTarget> for String {
    fn from(r: RepositoryTarget) -> Self {
        r.full_name()
    }
}

// ---------------------------------------------------------------------------
// File bindings
// ---------------------------------------------------------------------------

/// One `source -> destination` pair. The source is relative to the source
/// tree, the destination relative to the target repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBinding {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl FileBinding {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for FileBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.source.display(),
            self.destination.display()
        )
    }
}

/// Parses the `source=destination` form used on the command line.
impl FromStr for FileBinding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((src, dest)) if !src.trim().is_empty() && !dest.trim().is_empty() => {
                Ok(Self::new(src.trim(), dest.trim()))
            }
            _ => Err(ConfigError::InvalidBinding {
                binding: s.to_owned(),
                reason: "expected SOURCE=DESTINATION".to_owned(),
            }),
        }
    }
}

/// Ordered set of bindings with unique sources.
///
/// Order follows the configuration so copies and logs are deterministic.
/// An empty set is valid here; configuration loading rejects it separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FileBinding>", into = "Vec<FileBinding>")]
pub struct FileBindings(Vec<FileBinding>);

impl FileBindings {
    pub fn new(bindings: Vec<FileBinding>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for binding in &bindings {
            check_relative(binding, &binding.source)?;
            check_relative(binding, &binding.destination)?;
            check_outside_git_dir(binding)?;
            if !seen.insert(binding.source.clone()) {
                return Err(ConfigError::DuplicateBindingSource {
                    path: binding.source.clone(),
                });
            }
        }
        Ok(Self(bindings))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileBinding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<FileBinding>> for FileBindings {
    type Error = ConfigError;

    fn try_from(v: Vec<FileBinding>) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<FileBindings> for Vec<FileBinding> {
    fn from(b: FileBindings) -> Self {
        b.0
    }
}

impl<'a> IntoIterator for &'a FileBindings {
    type Item = &'a FileBinding;
    type IntoIter = std::slice::Iter<'a, FileBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn check_relative(binding: &FileBinding, path: &Path) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBinding {
        binding: binding.to_string(),
        reason: reason.to_owned(),
    };
    if path.as_os_str().is_empty() {
        return Err(invalid("empty path"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("path must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"))
            }
        }
    }
    Ok(())
}

fn check_outside_git_dir(binding: &FileBinding) -> Result<(), ConfigError> {
    let first = binding
        .destination
        .components()
        .find(|c| !matches!(c, Component::CurDir));
    if first == Some(Component::Normal(OsStr::new(".git"))) {
        return Err(ConfigError::InvalidBinding {
            binding: binding.to_string(),
            reason: "destination must not be inside .git".to_owned(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sync proposal
// ---------------------------------------------------------------------------

/// Whether the task opens a new pull request or appends to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SyncMode {
    Create,
    Update { pr_number: u64 },
}

impl SyncMode {
    pub fn pr_number(&self) -> Option<u64> {
        match self {
            SyncMode::Create => None,
            SyncMode::Update { pr_number } => Some(*pr_number),
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, SyncMode::Update { .. })
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Create => write!(f, "create"),
            SyncMode::Update { pr_number } => write!(f, "update #{pr_number}"),
        }
    }
}

/// The single in-flight sync branch / pull request pair for a repository.
///
/// `mode` is [`SyncMode::Update`] only when an open pull request with a
/// matching head branch was found; otherwise `branch_name` is freshly
/// generated and does not exist remotely yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProposal {
    pub branch_name: String,
    pub mode: SyncMode,
}

impl SyncProposal {
    pub fn create(branch_name: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            mode: SyncMode::Create,
        }
    }

    pub fn update(branch_name: impl Into<String>, pr_number: u64) -> Self {
        Self {
            branch_name: branch_name.into(),
            mode: SyncMode::Update { pr_number },
        }
    }
}

// ---------------------------------------------------------------------------
// Commit identity
// ---------------------------------------------------------------------------

/// Author identity used for sync commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
