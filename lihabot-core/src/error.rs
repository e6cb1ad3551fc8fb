use std::path::PathBuf;

use thiserror::Error;

/// Domain failures returned by roster and queue operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("tank \"{display_name}\" already exists")]
    DuplicateKey { display_name: String },

    #[error("you already own tank \"{existing}\", remove it first")]
    DuplicateOwner { existing: String },

    #[error("tank \"{0}\" not found")]
    NotFound(String),

    #[error("queue \"{0}\" not found")]
    QueueNotFound(String),

    #[error("you can only remove your own tank")]
    NotOwner,

    #[error("only registered tanks can do that")]
    NotAuthorized,

    #[error("already in {queue} (position {position})")]
    AlreadyQueued { queue: String, position: usize },

    #[error("already in {queue}, leave it before joining another")]
    AlreadyQueuedElsewhere { queue: String },

    #[error("not in {0}")]
    NotQueued(String),

    #[error("{0} is empty")]
    QueueEmpty(String),
}

/// Failures of the snapshot file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write snapshot to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to read snapshot from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot at {path} is corrupt: {source}")]
    ReadCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;
