// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - AWAIT-000-009: Aggregation errors
//! - AWAIT-010-019: Refresh errors
//! - AWAIT-020-029: Launcher / daemon errors
//! - AWAIT-030-039: Configuration errors

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AwaitError>;

/// Boxed error carried out of a failed task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Why polling a pending future broke down.
///
/// This is distinct from the future's own failure: a fault means the
/// handle can no longer report an outcome at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollFault {
    #[error("task '{name}' dropped its result channel without completing")]
    Disconnected { name: String },

    #[error("task '{name}' panicked: {message}")]
    Panicked { name: String, message: String },

    #[error("task '{name}' was cancelled by its executor")]
    Cancelled { name: String },

    #[error("task '{name}' result was already taken")]
    AlreadyTaken { name: String },
}

#[derive(Error, Debug)]
pub enum AwaitError {
    // ─────────────────────────────────────────────────────────────
    // Aggregation errors (AWAIT-000 to AWAIT-009)
    // ─────────────────────────────────────────────────────────────

    #[error("AWAIT-001: polling fault, aggregation aborted: {0}")]
    PollFault(#[from] PollFault),

    #[error("AWAIT-002: timed out after {elapsed:?} with {pending} future(s) unresolved")]
    Timeout { elapsed: Duration, pending: usize },

    #[error("AWAIT-003: task '{key}' failed: {source}")]
    TaskFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("AWAIT-004: key {key} was supplied more than once")]
    DuplicateKey { key: String },

    // ─────────────────────────────────────────────────────────────
    // Refresh errors (AWAIT-010 to AWAIT-019)
    // ─────────────────────────────────────────────────────────────

    #[error("AWAIT-010: '{name}' has no value yet ({errors} consecutive refresh error(s))")]
    NotPopulated { name: String, errors: u32 },

    // ─────────────────────────────────────────────────────────────
    // Launcher / daemon errors (AWAIT-020 to AWAIT-029)
    // ─────────────────────────────────────────────────────────────

    #[error("AWAIT-020: failed to launch background task '{name}': {reason}")]
    Launch { name: String, reason: String },

    #[error("AWAIT-021: daemon '{name}' did not stop within {wait:?}")]
    DaemonStuck { name: String, wait: Duration },

    // ─────────────────────────────────────────────────────────────
    // Configuration errors (AWAIT-030 to AWAIT-039)
    // ─────────────────────────────────────────────────────────────

    #[error("AWAIT-030: configuration error: {reason}")]
    Config { reason: String },

    #[error("AWAIT-031: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("AWAIT-032: IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AwaitError {
    /// Build a `TaskFailed` from any key and error type.
    pub fn task_failed<K, E>(key: &K, err: E) -> Self
    where
        K: std::fmt::Debug,
        E: Into<BoxError>,
    {
        AwaitError::TaskFailed {
            key: format!("{:?}", key),
            source: err.into(),
        }
    }

    /// Get the error code (e.g., "AWAIT-001")
    pub fn code(&self) -> &'static str {
        match self {
            AwaitError::PollFault(_) => "AWAIT-001",
            AwaitError::Timeout { .. } => "AWAIT-002",
            AwaitError::TaskFailed { .. } => "AWAIT-003",
            AwaitError::DuplicateKey { .. } => "AWAIT-004",
            AwaitError::NotPopulated { .. } => "AWAIT-010",
            AwaitError::Launch { .. } => "AWAIT-020",
            AwaitError::DaemonStuck { .. } => "AWAIT-021",
            AwaitError::Config { .. } => "AWAIT-030",
            AwaitError::YamlParse(_) => "AWAIT-031",
            AwaitError::Io(_) => "AWAIT-032",
        }
    }
}

impl FixSuggestion for AwaitError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            AwaitError::PollFault(_) => {
                Some("A task died without reporting; check its logs for a panic")
            }
            AwaitError::Timeout { .. } => Some("Raise the deadline or inspect the slow tasks"),
            AwaitError::TaskFailed { .. } => None,
            AwaitError::DuplicateKey { .. } => {
                Some("Give every future in a batch its own key")
            }
            AwaitError::NotPopulated { .. } => {
                Some("The first refresh failed; later reads retry with backoff")
            }
            AwaitError::Launch { .. } => Some("Check thread limits (ulimit -u) and runtime state"),
            AwaitError::DaemonStuck { .. } => {
                Some("process() is blocking; make it return periodically")
            }
            AwaitError::Config { .. } => Some("Check the settings file and AWAITKIT_* variables"),
            AwaitError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            AwaitError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
