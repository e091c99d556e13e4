//! Application-wide error types.
//!
//! The variants mirror the error taxonomy of the streaming kernel: each one
//! maps to a specific HTTP status and terminal-marker policy in
//! `api::error::ApiError`.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error while {op} at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoPlain(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing or invalid source URL")]
    InputInvalid,

    #[error("probe backend unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("probe timed out after {0:?}")]
    ProbeTimeout(std::time::Duration),

    #[error("could not parse probe response: {0}")]
    ProbeParse(String),

    #[error("plan rejected: {0}")]
    PlanRejected(String),

    #[error("failed to start transcoder subprocess: {0}")]
    SubprocessStartFailed(String),

    #[error("transcoder subprocess failed: {0}")]
    SubprocessFailed(String),

    #[error("transcoder finished without producing complete output")]
    IncompleteOutput,

    #[error("playlist is invalid: {0}")]
    PlaylistInvalid(String),

    #[error("wait for {0} was cancelled")]
    WaiterCancelled(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("object storage error: {0}")]
    Snapshot(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
