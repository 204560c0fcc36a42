//! Sync branch naming: the pattern that recognises existing sync branches and
//! the template that generates new ones.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::ConfigError;

pub const DEFAULT_BRANCH_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}-sync-file-pr$";
pub const DEFAULT_BRANCH_TEMPLATE: &str = "{date}-sync-file-pr";

/// Compiled branch naming rules.
///
/// Construction guarantees that every generated name matches the pattern, so
/// a branch created by one run is found again by the next one.
#[derive(Debug, Clone)]
pub struct BranchPolicy {
    pattern: Regex,
    template: String,
}

impl BranchPolicy {
    pub fn new(pattern: &str, template: &str) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        if template.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "branch_template",
            });
        }
        if template.chars().any(|c| c.is_whitespace() || c == '~' || c == ':') {
            return Err(ConfigError::InvalidValue {
                field: "branch_template",
                value: template.to_owned(),
                reason: "not a valid git branch name".to_owned(),
            });
        }

        let policy = Self {
            pattern: compiled,
            template: template.to_owned(),
        };
        let sample = policy.generate(Utc::now());
        if !policy.matches(&sample) {
            return Err(ConfigError::TemplateMismatch {
                template: template.to_owned(),
                sample,
                pattern: pattern.to_owned(),
            });
        }
        Ok(policy)
    }

    /// Does `branch` look like a sync branch?
    pub fn matches(&self, branch: &str) -> bool {
        self.pattern.is_match(branch)
    }

    /// Render a fresh branch name. `{date}` becomes `YYYY-MM-DD`, `{time}`
    /// becomes `HHMMSS` (UTC).
    pub fn generate(&self, now: DateTime<Utc>) -> String {
        self.template
            .replace("{date}", &now.format("%Y-%m-%d").to_string())
            .replace("{time}", &now.format("%H%M%S").to_string())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}
