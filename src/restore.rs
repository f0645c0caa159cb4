//! Restore pipeline (C8): two-pass scan of a fetched manifest, parallel download and
//! decompression of each chunk to its original relative path, mtime restoration.

use crossbeam_channel::{Receiver, Sender, bounded};
use filetime::{FileTime, set_file_mtime};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::codec;
use crate::error::BackupError;
use crate::manifest;
use crate::remote::ObjectStore;
use crate::types::{FileRecord, RestoreFailure, from_posix};

/// Informational counts from pass 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestoreStats {
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Outcome of pass 2.
#[derive(Debug, Default)]
pub struct RestoreOutcome {
    pub files_restored: usize,
    pub bytes_restored: u64,
    pub failures: Vec<RestoreFailure>,
}

/// Pass 1: stream the manifest, tallying every record for progress reporting.
pub fn scan_restore_stats(manifest_path: &Path) -> Result<RestoreStats, BackupError> {
    let mut stats = RestoreStats::default();
    for record in manifest::read_manifest_lines(manifest_path)? {
        let record = record?;
        stats.total_files += 1;
        stats.total_bytes += record.size;
    }
    Ok(stats)
}

struct RestoreTask {
    record: FileRecord,
    dest_path: PathBuf,
}

fn restore_one(task: &RestoreTask, store: &dyn ObjectStore) -> Result<u64, BackupError> {
    if let Some(parent) = task.dest_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
    }

    let tmp = tempfile::NamedTempFile::new()
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
    let tmp_path = tmp.into_temp_path();
    store.get_object_to_file(&task.record.chunk_key, &tmp_path)?;
    codec::decompress(&tmp_path, &task.dest_path)?;

    let mtime = FileTime::from_unix_time(
        task.record.mod_time / 1_000_000_000,
        (task.record.mod_time % 1_000_000_000) as u32,
    );
    set_file_mtime(&task.dest_path, mtime)
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;

    Ok(task.record.size)
}

/// Pass 2: stream the manifest again, submitting one download task per record to a
/// fixed-width worker pool. Per-file failures (most commonly
/// [`BackupError::RestoreTargetExists`]) are logged and counted, never fatal to the run.
pub fn run_restores(
    manifest_path: &Path,
    restore_root: &Path,
    store: &dyn ObjectStore,
    worker_count: usize,
) -> Result<RestoreOutcome, BackupError> {
    let (task_tx, task_rx): (Sender<RestoreTask>, Receiver<RestoreTask>) =
        bounded(worker_count * 4);
    let restored_count = AtomicU64::new(0);
    let restored_bytes = AtomicU64::new(0);
    let failures: Mutex<Vec<RestoreFailure>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| -> Result<(), BackupError> {
        for _ in 0..worker_count.max(1) {
            let task_rx = task_rx.clone();
            let restored_count = &restored_count;
            let restored_bytes = &restored_bytes;
            let failures = &failures;
            scope.spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let path = task.record.path.clone();
                    match restore_one(&task, store) {
                        Ok(bytes) => {
                            restored_count.fetch_add(1, Ordering::Relaxed);
                            restored_bytes.fetch_add(bytes, Ordering::Relaxed);
                        }
                        Err(e) => {
                            log::error!("[Error] restoring {path}: {e}");
                            failures.lock().unwrap().push(RestoreFailure {
                                path,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            });
        }

        for record in manifest::read_manifest_lines(manifest_path)? {
            let record: FileRecord = record?;
            let dest_path = restore_root.join(from_posix(&record.path));
            let task = RestoreTask { record, dest_path };
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);
        Ok(())
    })?;

    Ok(RestoreOutcome {
        files_restored: restored_count.load(Ordering::Relaxed) as usize,
        bytes_restored: restored_bytes.load(Ordering::Relaxed),
        failures: failures.into_inner().unwrap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FsObjectStore;
    use std::fs::File;

    fn seed_chunk(store: &FsObjectStore, dir: &Path, key: &str, content: &[u8]) {
        let src = dir.join("seed.bin");
        std::fs::write(&src, content).unwrap();
        let (tmp_path, _) = codec::compress(&src).unwrap();
        store.put_object_from_file(key, &tmp_path).unwrap();
        std::fs::remove_file(&tmp_path).unwrap();
    }

    fn rec(path: &str, chunk_key: &str, size: u64, mod_time: i64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            chunk_key: chunk_key.to_string(),
            size,
            mod_time,
            creation_time: 0,
        }
    }

    #[test]
    fn restores_files_and_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("remote"));
        seed_chunk(&store, dir.path(), "chunk/sha512/a.deflate", b"hello\n");

        let manifest_path = dir.path().join("manifest.ndjson");
        let mut f = File::create(&manifest_path).unwrap();
        let mod_time = 1_700_000_000_123_456_789;
        manifest::write_manifest_line(&mut f, &rec("a.txt", "chunk/sha512/a.deflate", 6, mod_time))
            .unwrap();
        drop(f);

        let restore_root = dir.path().join("restored");
        std::fs::create_dir_all(&restore_root).unwrap();

        let stats = scan_restore_stats(&manifest_path).unwrap();
        assert_eq!(stats.total_files, 1);

        let outcome = run_restores(&manifest_path, &restore_root, &store, 2).unwrap();
        assert_eq!(outcome.files_restored, 1);
        assert!(outcome.failures.is_empty());

        let restored_content = std::fs::read(restore_root.join("a.txt")).unwrap();
        assert_eq!(restored_content, b"hello\n");

        let meta = std::fs::metadata(restore_root.join("a.txt")).unwrap();
        let restored_mtime = FileTime::from_last_modification_time(&meta);
        assert_eq!(restored_mtime.unix_seconds(), mod_time / 1_000_000_000);
    }

    #[test]
    fn existing_destination_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("remote"));
        seed_chunk(&store, dir.path(), "chunk/sha512/a.deflate", b"hello\n");
        seed_chunk(&store, dir.path(), "chunk/sha512/b.deflate", b"world\n");

        let manifest_path = dir.path().join("manifest.ndjson");
        let mut f = File::create(&manifest_path).unwrap();
        manifest::write_manifest_line(&mut f, &rec("a.txt", "chunk/sha512/a.deflate", 6, 0))
            .unwrap();
        manifest::write_manifest_line(&mut f, &rec("b.txt", "chunk/sha512/b.deflate", 6, 0))
            .unwrap();
        drop(f);

        let restore_root = dir.path().join("restored");
        std::fs::create_dir_all(&restore_root).unwrap();
        std::fs::write(restore_root.join("a.txt"), b"already here").unwrap();

        let outcome = run_restores(&manifest_path, &restore_root, &store, 2).unwrap();
        assert_eq!(outcome.files_restored, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "a.txt");

        assert_eq!(
            std::fs::read(restore_root.join("b.txt")).unwrap(),
            b"world\n"
        );
        assert_eq!(
            std::fs::read(restore_root.join("a.txt")).unwrap(),
            b"already here"
        );
    }
}
