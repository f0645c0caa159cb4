//! `ObjectStore`: the remote object-store interface the core depends on (spec.md §6),
//! with a local-filesystem-backed default implementation.
//!
//! The real SDK (OSS/S3/whatever) is an external collaborator out of scope for this
//! crate's algorithmic content; `FsObjectStore` ships as the substrate production
//! code can swap out and as the fixture integration tests run against.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BackupError;
use crate::types::ListPage;

/// Required remote operations. Implementations must be `Send + Sync`: the upload and
/// restore worker pools share one handle across `W` threads.
pub trait ObjectStore: Send + Sync {
    /// List up to `page_size` keys under `prefix`, starting after `marker` if given.
    fn list_objects(
        &self,
        prefix: &str,
        page_size: usize,
        marker: Option<&str>,
    ) -> Result<ListPage, BackupError>;

    /// Upload the local file at `local_path` under `key`, overwriting any existing object.
    fn put_object_from_file(&self, key: &str, local_path: &Path) -> Result<(), BackupError>;

    /// Download the object at `key` to `local_path`, overwriting any existing local file.
    fn get_object_to_file(&self, key: &str, local_path: &Path) -> Result<(), BackupError>;
}

/// A local-filesystem-backed `ObjectStore`: objects live at `root/<key>`, with `/` in
/// the key mapped to nested directories.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for FsObjectStore {
    fn list_objects(
        &self,
        prefix: &str,
        page_size: usize,
        marker: Option<&str>,
    ) -> Result<ListPage, BackupError> {
        let inner = || -> anyhow::Result<ListPage> {
            let prefix_dir = self.root.join(prefix);
            let mut keys = Vec::new();
            if prefix_dir.is_dir() {
                collect_keys(&self.root, &prefix_dir, &mut keys)?;
            }
            keys.sort();

            let start = match marker {
                Some(m) => keys.partition_point(|k| k.as_str() <= m),
                None => 0,
            };
            let remaining = &keys[start.min(keys.len())..];
            let truncated = remaining.len() > page_size;
            let page: Vec<String> = remaining.iter().take(page_size).cloned().collect();
            let next_marker = if truncated {
                page.last().cloned()
            } else {
                None
            };
            Ok(ListPage {
                keys: page,
                next_marker,
                truncated,
            })
        };
        inner().map_err(BackupError::RemoteListError)
    }

    fn put_object_from_file(&self, key: &str, local_path: &Path) -> Result<(), BackupError> {
        let inner = || -> anyhow::Result<()> {
            let dst = self.object_path(key);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
            fs::copy(local_path, &dst)
                .with_context(|| format!("copy to {}", dst.display()))?;
            Ok(())
        };
        inner().map_err(|source| BackupError::RemotePutError {
            key: key.to_string(),
            source,
        })
    }

    fn get_object_to_file(&self, key: &str, local_path: &Path) -> Result<(), BackupError> {
        let inner = || -> anyhow::Result<()> {
            let src = self.object_path(key);
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
            fs::copy(&src, local_path)
                .with_context(|| format!("copy from {}", src.display()))?;
            Ok(())
        };
        inner().map_err(|source| BackupError::RemoteGetError {
            key: key.to_string(),
            source,
        })
    }
}

fn collect_keys(root: &Path, dir: &Path, out: &mut Vec<String>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))? {
        let entry = entry.context("read directory entry")?;
        let path = entry.path();
        if path.is_dir() {
            collect_keys(root, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .expect("entry is under root by construction");
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"payload").unwrap();
        store.put_object_from_file("chunk/sha512/abc.deflate", &src).unwrap();

        let dst = dir.path().join("dst.bin");
        store.get_object_to_file("chunk/sha512/abc.deflate", &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
    }

    #[test]
    fn list_objects_paginates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"x").unwrap();

        for i in 0..1500 {
            let key = format!("chunk/sha512/{i:05}.deflate");
            store.put_object_from_file(&key, &src).unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        let mut marker = None;
        loop {
            let page = store
                .list_objects("chunk/sha512/", 1000, marker.as_deref())
                .unwrap();
            seen.extend(page.keys.iter().cloned());
            if !page.truncated {
                break;
            }
            marker = page.next_marker;
        }
        assert_eq!(seen.len(), 1500);
    }

    #[test]
    fn get_missing_object_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let dst = dir.path().join("dst.bin");
        let err = store.get_object_to_file("chunk/sha512/missing.deflate", &dst);
        assert!(err.is_err());
    }
}
