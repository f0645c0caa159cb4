//! Run configuration and tuning constants.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BackupError;

/// Object-store credentials and addressing, loaded from a named TOML file (`-c <name>`).
#[derive(Clone, Debug, Deserialize)]
pub struct OssConfig {
    pub api_prefix: String,
    pub bucket_name: String,
    pub oss_key: String,
    pub oss_secret: String,
}

/// Top-level run configuration. All fields are required and non-empty.
#[derive(Clone, Debug, Deserialize)]
pub struct BackupConfig {
    pub file_root_path: PathBuf,
    pub oss: OssConfig,
}

impl BackupConfig {
    /// Load `<name>.toml` from the current directory and validate it.
    pub fn load(name: &str) -> Result<Self, BackupError> {
        let path = PathBuf::from(format!("{name}.toml"));
        Self::load_from_path(&path)
    }

    /// Load and validate a config file at an explicit path.
    pub fn load_from_path(path: &Path) -> Result<Self, BackupError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BackupError::ConfigInvalid(format!("reading {}: {e}", path.display()))
        })?;
        let cfg: BackupConfig = toml::from_str(&raw)
            .map_err(|e| BackupError::ConfigInvalid(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), BackupError> {
        if !self.file_root_path.is_dir() {
            return Err(BackupError::SourcePathMissing(self.file_root_path.clone()));
        }
        let OssConfig {
            api_prefix,
            bucket_name,
            oss_key,
            oss_secret,
        } = &self.oss;
        for (name, v) in [
            ("oss.api_prefix", api_prefix),
            ("oss.bucket_name", bucket_name),
            ("oss.oss_key", oss_key),
            ("oss.oss_secret", oss_secret),
        ] {
            if v.trim().is_empty() {
                return Err(BackupError::ConfigInvalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Tuning constants, collected in one place the way a typical indexer's `consts` module does.
pub struct Consts;

impl Consts {
    /// Width of the bounded worker pool used for uploads and downloads.
    pub const WORKER_POOL_SIZE: usize = 12;
    /// Wall-clock cadence at which the walker commits the open cache transaction.
    pub const CACHE_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
    /// Page size used when listing remote chunk keys.
    pub const LIST_PAGE_SIZE: usize = 1000;
    /// Minimum line-buffer capacity for manifest scanning, in bytes: at least
    /// 10x a conservative default line-buffer size, to accommodate long paths.
    pub const MANIFEST_SCAN_BUFFER: usize = 10 * 8 * 1024;
    /// Prefix under which every chunk object is stored.
    pub const CHUNK_PREFIX: &'static str = "chunk/sha512/";
    /// Prefix under which manifest objects are stored.
    pub const MANIFEST_PREFIX: &'static str = "indexes/";
    /// Fixed filename of the local hash-cache database, under the source root.
    pub const CACHE_FILENAME: &'static str = ".__ossIndex_special_.cache.dat";
    /// Reserved local-filename prefix the walker must always skip.
    pub const RESERVED_PREFIX: &'static str = ".__ossIndex_special_.";
    /// Reserved local-filename suffix the walker must always skip (paired with the prefix).
    pub const RESERVED_SUFFIX: &'static str = ".dat";
}
