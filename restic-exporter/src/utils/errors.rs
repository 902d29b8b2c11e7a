//! Error types for the exporter.
//!
//! Each layer owns its own enum. The binary wraps startup failures with
//! `anyhow` context.

use thiserror::Error;

/// Failure to load the repository configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Secret resolution failed for {repo}: {source}")]
    Secret {
        repo: String,
        #[source]
        source: SecretError,
    },

    #[error("No usable credential for repository {0}")]
    MissingCredential(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failure talking to the secret store.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Environment error: {0}")]
    Env(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Secret {path} has no field {field}")]
    MissingField { path: String, field: String },
}

/// Failure opening or reading a single repository.
///
/// These never escape a repository task; they are logged and turned into a
/// read error flag on the result.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Failed to start restic: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("restic exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Invalid schedule or scheduler failure.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Invalid time zone {0:?}")]
    InvalidTimeZone(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}
