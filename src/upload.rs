//! Upload pipeline (C6): two-pass scan of a manifest, compressing and PUTting every
//! chunk not already present on the remote through a bounded worker pool.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::codec;
use crate::error::BackupError;
use crate::manifest;
use crate::remote::{ObjectStore, RemoteChunkSet};
use crate::types::{FileRecord, UploadFailure};

/// Informational counts from pass 1, surfaced as progress before pass 2 starts work.
#[derive(Debug, Default, Clone, Copy)]
pub struct UploadStats {
    pub total_count: usize,
    pub total_bytes: u64,
}

/// Outcome of pass 2.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub chunks_uploaded: usize,
    pub bytes_uploaded: u64,
    pub failures: Vec<UploadFailure>,
}

/// Pass 1: stream the manifest, tallying records whose chunk is absent remotely.
/// Purely informational; does no I/O beyond reading the manifest itself.
pub fn scan_upload_stats(
    manifest_path: &Path,
    remote: &RemoteChunkSet,
) -> Result<UploadStats, BackupError> {
    let mut stats = UploadStats::default();
    for record in manifest::read_manifest_lines(manifest_path)? {
        let record = record?;
        if !remote.contains(&record.chunk_key) {
            stats.total_count += 1;
            stats.total_bytes += record.size;
        }
    }
    Ok(stats)
}

/// A single upload task: compress `source_root / path` and PUT it under `chunk_key`.
struct UploadTask {
    path: String,
    chunk_key: String,
    source_path: PathBuf,
}

fn upload_one(task: &UploadTask, store: &dyn ObjectStore) -> Result<u64, BackupError> {
    let (tmp_path, compressed_size) = codec::compress(&task.source_path)?;
    let put_result = store.put_object_from_file(&task.chunk_key, &tmp_path);
    let _ = std::fs::remove_file(&tmp_path);
    put_result?;
    Ok(compressed_size)
}

/// Pass 2: stream the manifest again, submitting one task per record whose chunk is
/// absent remotely to a fixed-width worker pool. Two records sharing a `chunk_key`
/// within one run are deduplicated via an in-run `already_enqueued` set: the object
/// store would tolerate a repeat PUT of identical content-addressed bytes, but
/// uploading it more than once is still wasted work the manifest already told us about.
///
/// A task failure does not abort the run: it is collected into
/// [`UploadOutcome::failures`] and the remaining tasks still run to completion.
pub fn run_uploads(
    manifest_path: &Path,
    source_root: &Path,
    remote: &RemoteChunkSet,
    store: &dyn ObjectStore,
    worker_count: usize,
) -> Result<UploadOutcome, BackupError> {
    let (task_tx, task_rx): (Sender<UploadTask>, Receiver<UploadTask>) = bounded(worker_count * 4);
    let uploaded_count = AtomicU64::new(0);
    let uploaded_bytes = AtomicU64::new(0);
    let failures: Mutex<Vec<UploadFailure>> = Mutex::new(Vec::new());
    let mut already_enqueued: std::collections::HashSet<String> = std::collections::HashSet::new();

    std::thread::scope(|scope| -> Result<(), BackupError> {
        for _ in 0..worker_count.max(1) {
            let task_rx = task_rx.clone();
            let uploaded_count = &uploaded_count;
            let uploaded_bytes = &uploaded_bytes;
            let failures = &failures;
            scope.spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    match upload_one(&task, store) {
                        Ok(bytes) => {
                            uploaded_count.fetch_add(1, Ordering::Relaxed);
                            uploaded_bytes.fetch_add(bytes, Ordering::Relaxed);
                        }
                        Err(e) => {
                            log::error!("[Error] uploading {}: {e}", task.path);
                            failures.lock().unwrap().push(UploadFailure {
                                path: task.path,
                                chunk_key: task.chunk_key,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            });
        }

        for record in manifest::read_manifest_lines(manifest_path)? {
            let record: FileRecord = record?;
            if remote.contains(&record.chunk_key) {
                continue;
            }
            if !already_enqueued.insert(record.chunk_key.clone()) {
                continue;
            }
            let task = UploadTask {
                path: record.path.clone(),
                chunk_key: record.chunk_key.clone(),
                source_path: source_root.join(crate::types::from_posix(&record.path)),
            };
            // A send error means every worker has exited, which only happens after a
            // catastrophic thread panic; there is nothing more to submit in that case.
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);
        Ok(())
    })?;

    Ok(UploadOutcome {
        chunks_uploaded: uploaded_count.load(Ordering::Relaxed) as usize,
        bytes_uploaded: uploaded_bytes.load(Ordering::Relaxed),
        failures: failures.into_inner().unwrap(),
    })
}
