//! Orchestrator (C9): assembles the backup and restore flows from C1-C8 against a
//! single [`Session`].

use std::time::Duration;

use time::OffsetDateTime;

use crate::config::Consts;
use crate::error::BackupError;
use crate::manifest;
use crate::remote::RemoteChunkSet;
use crate::session::Session;
use crate::types::{BackupReport, RestoreReport};
use crate::{cache, restore, upload, walk};

/// Backup flow: build the remote chunk snapshot, walk the source tree into a local
/// manifest (consulting/populating the hash cache as it goes), upload every chunk the
/// snapshot doesn't already have, then upload the manifest itself and discard the
/// local copy.
pub fn run_backup(session: &mut Session) -> Result<BackupReport, BackupError> {
    let root = session.config.file_root_path.clone();

    let remote = RemoteChunkSet::build(session.store.as_ref(), Consts::CHUNK_PREFIX)?;

    let mut conn = cache::open(&session.cache_path())?;

    let manifest_tmp = tempfile::NamedTempFile::new()
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
    let manifest_path = manifest_tmp.path().to_path_buf();
    let walk_report = {
        let mut writer = std::io::BufWriter::new(
            std::fs::OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&manifest_path)
                .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?,
        );
        walk::run_walk(&root, &mut conn, &mut writer, Consts::CACHE_FLUSH_INTERVAL)?
    };

    let upload_stats = upload::scan_upload_stats(&manifest_path, &remote)?;
    log::info!(
        "uploading {} chunk(s), {} byte(s)",
        upload_stats.total_count,
        upload_stats.total_bytes
    );
    let upload_outcome = upload::run_uploads(
        &manifest_path,
        &root,
        &remote,
        session.store.as_ref(),
        session.worker_count,
    )?;
    for failure in &upload_outcome.failures {
        log::error!("[Error] upload failed for {}: {}", failure.path, failure.error);
    }

    let manifest_key = manifest::upload_manifest(
        session.store.as_ref(),
        &manifest_path,
        OffsetDateTime::now_utc(),
    )?;

    drop(manifest_tmp);

    Ok(BackupReport {
        files_indexed: walk_report.files_indexed,
        files_skipped: walk_report.files_skipped,
        chunks_uploaded: upload_outcome.chunks_uploaded,
        bytes_uploaded: upload_outcome.bytes_uploaded,
        manifest_key,
        upload_failures: upload_outcome.failures,
    })
}

/// Restore flow: fetch and decompress the manifest stored under `timestamp`, then
/// parallel-download and decompress every referenced chunk into `restore_root`.
pub fn run_restore(
    session: &Session,
    timestamp: &str,
    restore_root: &std::path::Path,
) -> Result<RestoreReport, BackupError> {
    std::fs::create_dir_all(restore_root)
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;

    let manifest_tmp = tempfile::NamedTempFile::new()
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
    let manifest_path = manifest_tmp.path().to_path_buf();
    std::fs::remove_file(&manifest_path).ok();
    manifest::fetch_manifest(session.store.as_ref(), timestamp, &manifest_path)?;

    let stats = restore::scan_restore_stats(&manifest_path)?;
    log::info!(
        "restoring {} file(s), {} byte(s)",
        stats.total_files,
        stats.total_bytes
    );

    let outcome = restore::run_restores(
        &manifest_path,
        restore_root,
        session.store.as_ref(),
        session.worker_count,
    )?;
    for failure in &outcome.failures {
        log::error!("[Error] restore failed for {}: {}", failure.path, failure.error);
    }

    std::fs::remove_file(&manifest_path).ok();

    Ok(RestoreReport {
        files_restored: outcome.files_restored,
        bytes_restored: outcome.bytes_restored,
        restore_failures: outcome.failures,
    })
}

/// Convenience: the flush interval orchestrator uses when driving the walker, exposed
/// for callers assembling their own pipeline around individual components.
pub fn default_flush_interval() -> Duration {
    Consts::CACHE_FLUSH_INTERVAL
}
