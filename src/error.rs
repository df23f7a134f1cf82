use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FseeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Rejections raised while validating a [`TraverseConfig`](crate::config::TraverseConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("traversal root path is not set")]
    MissingPath,

    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },

    #[error("invalid marker {marker:?}: {reason}")]
    InvalidMarker { marker: String, reason: &'static str },

    #[error("processor {program:?} does not exist")]
    ProcessorNotFound { program: String },
}

/// Failure reported by an item processor.
///
/// Every variant is treated the same way by the engine: the item is retried
/// until its retry budget is spent, then archived as ignored.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Failed(String),

    #[error("processor exited with {}: {stderr}", exit_label(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("failed to run processor: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessError::Failed(message.into())
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// Payload of `warning` and `error` notifications.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The processor failed on the given attempt (1-based).
    #[error("attempt {attempt}: {source}")]
    Process {
        attempt: u32,
        #[source]
        source: ProcessError,
    },

    /// A directory could not be stat'ed or listed during the walk.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
