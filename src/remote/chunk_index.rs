//! Remote chunk index (C4): an in-memory snapshot of chunk keys present on the
//! remote, built once per run by paginated listing.

use std::collections::HashSet;

use crate::config::Consts;
use crate::error::BackupError;
use crate::remote::ObjectStore;

/// Read-only after construction; cheap to share across the upload worker pool via `Arc`.
///
/// A snapshot: chunks uploaded by a concurrent actor after this is built are not
/// visible, so a false negative here causes at most a harmless re-upload (PUT of
/// identical content-keyed bytes is idempotent).
pub struct RemoteChunkSet {
    keys: HashSet<String>,
}

impl RemoteChunkSet {
    /// Page through `store.list_objects(prefix, ...)` until exhausted. Listing
    /// failures are fatal to the run (no point uploading against an unknown remote
    /// state).
    pub fn build(store: &dyn ObjectStore, prefix: &str) -> Result<Self, BackupError> {
        let mut keys = HashSet::new();
        let mut marker: Option<String> = None;
        loop {
            let page = store.list_objects(prefix, Consts::LIST_PAGE_SIZE, marker.as_deref())?;
            keys.extend(page.keys);
            if !page.truncated {
                break;
            }
            marker = page.next_marker;
            if marker.is_none() {
                break;
            }
        }
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FsObjectStore;

    #[test]
    fn build_enumerates_past_the_page_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"x").unwrap();
        for i in 0..1200 {
            store
                .put_object_from_file(&format!("chunk/sha512/{i:05}.deflate"), &src)
                .unwrap();
        }

        let set = RemoteChunkSet::build(&store, "chunk/sha512/").unwrap();
        assert_eq!(set.len(), 1200);
        assert!(set.contains("chunk/sha512/00000.deflate"));
        assert!(set.contains("chunk/sha512/01199.deflate"));
        assert!(!set.contains("chunk/sha512/99999.deflate"));
    }

    #[test]
    fn build_on_empty_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let set = RemoteChunkSet::build(&store, "chunk/sha512/").unwrap();
        assert!(set.is_empty());
    }
}
