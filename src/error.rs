//! Public error type for the backup/restore API boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced at the public API boundary (`run_backup`, `run_restore`).
///
/// Internal plumbing uses `anyhow::Result` with `.context()` at I/O edges and converts
/// to one of these variants where it crosses into `session`/`orchestrator`. Per-file
/// failures (hashing, upload, download) do not produce these; they accumulate into a
/// run report instead (see [`crate::types::BackupReport`], [`crate::types::RestoreReport`]).
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("source path does not exist or is not a directory: {0}")]
    SourcePathMissing(PathBuf),

    #[error("hash cache I/O error: {0}")]
    CacheIOError(#[source] anyhow::Error),

    #[error("local I/O error: {0}")]
    LocalIOError(#[source] anyhow::Error),

    #[error("failed to list remote chunks: {0}")]
    RemoteListError(#[source] anyhow::Error),

    #[error("failed to upload {key}: {source}")]
    RemotePutError {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to download {key}: {source}")]
    RemoteGetError {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to hash {path}: {source}")]
    HashError {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("compression error: {0}")]
    CompressionError(#[source] anyhow::Error),

    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[source] anyhow::Error),

    #[error("restore target already exists: {0}")]
    RestoreTargetExists(PathBuf),

    #[error("{0}")]
    RunIncomplete(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;
