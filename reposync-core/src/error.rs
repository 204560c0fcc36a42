//! Error types for reposync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or missing settings. Always fatal: the run aborts before any
/// repository is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with path and serde_yaml line context.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting is absent or empty.
    #[error("{field} is empty but required")]
    Missing { field: &'static str },

    /// A repository entry is not of the form `owner/name`.
    #[error("invalid repository '{value}': {{OWNER}}/{{NAME}} expected")]
    InvalidRepository { value: String },

    /// The same repository is listed twice.
    #[error("repository '{repository}' is listed more than once")]
    DuplicateRepository { repository: String },

    /// A `--repo` filter names a repository that is not configured.
    #[error("repository '{repository}' is not part of the configuration")]
    UnknownRepository { repository: String },

    /// A file binding is malformed.
    #[error("incorrect binding {binding}: {reason}")]
    InvalidBinding { binding: String, reason: String },

    /// Two bindings share the same source path.
    #[error("binding source '{}' is bound more than once", .path.display())]
    DuplicateBindingSource { path: PathBuf },

    /// The sync branch pattern is not a valid regular expression.
    #[error("invalid branch pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Branch names generated from the template would not be recognised by
    /// the pattern on the next run.
    #[error("branch template '{template}' renders '{sample}' which does not match pattern '{pattern}'")]
    TemplateMismatch {
        template: String,
        sample: String,
        pattern: String,
    },

    /// A setting has an unusable value.
    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}
