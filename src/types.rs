//! Data model shared across the backup and restore pipelines.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One line in a manifest: a logical path and the chunk that holds its content.
///
/// Field names are `PascalCase` on the wire (spec-compatible manifest format); see §6.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "ChunkKey")]
    pub chunk_key: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "ModTime")]
    pub mod_time: i64,
    #[serde(rename = "CreationTime")]
    pub creation_time: i64,
}

/// Stored row shape for the hash cache: `(mod_time, size, sha512)`.
pub type CacheRow = (i64, u64, String);

/// Outcome of one upload task.
#[derive(Debug)]
pub struct UploadFailure {
    pub path: String,
    pub chunk_key: String,
    pub error: String,
}

/// Outcome of one restore task.
#[derive(Debug)]
pub struct RestoreFailure {
    pub path: String,
    pub error: String,
}

/// Aggregate result of a backup run.
#[derive(Debug, Default)]
pub struct BackupReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks_uploaded: usize,
    pub bytes_uploaded: u64,
    pub manifest_key: String,
    pub upload_failures: Vec<UploadFailure>,
}

impl BackupReport {
    pub fn is_success(&self) -> bool {
        self.upload_failures.is_empty()
    }
}

/// Aggregate result of a restore run.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub files_restored: usize,
    pub bytes_restored: u64,
    pub restore_failures: Vec<RestoreFailure>,
}

impl RestoreReport {
    pub fn is_success(&self) -> bool {
        self.restore_failures.is_empty()
    }
}

/// A page of keys returned by [`crate::remote::ObjectStore::list_objects`].
#[derive(Debug, Default, Clone)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_marker: Option<String>,
    pub truncated: bool,
}

/// Convert a POSIX-style relative path (as stored in a `FileRecord`) into a local `PathBuf`.
pub fn from_posix(rel_path: &str) -> PathBuf {
    PathBuf::from(rel_path)
}

/// Normalize a local relative path into the POSIX-slash form stored in a manifest.
pub fn to_posix(rel_path: &std::path::Path) -> String {
    rel_path.to_string_lossy().replace('\\', "/")
}
