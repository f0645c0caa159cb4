//! Directory walker & indexer (C5): single-threaded depth-first walk, querying the
//! hash cache on every file and falling back to hashing on a miss.

use rusqlite::Connection;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

use crate::cache::{self, FlushClock, Txn};
use crate::config::Consts;
use crate::error::BackupError;
use crate::hashing;
use crate::manifest;
use crate::types::{FileRecord, to_posix};

/// Result of one walk.
#[derive(Debug, Default)]
pub struct WalkReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
}

/// True if `path`'s basename matches this system's reserved pattern (cache DB, temp
/// manifests): begins with `.__ossIndex_special_.` and ends with `.dat`. These must
/// never be backed up as themselves.
///
/// Any other file beginning with the reserved prefix (e.g. the `-wal`/`-shm` side
/// files SQLite's WAL mode leaves next to the cache DB) is skipped too: the canonical
/// `prefix...dat` match alone would miss those, and they are exactly as much this
/// system's own artifact as the `.dat` file itself.
pub fn should_skip_reserved(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| {
            name.starts_with(Consts::RESERVED_PREFIX)
                && (name.ends_with(Consts::RESERVED_SUFFIX) || name.contains(Consts::RESERVED_SUFFIX))
        })
        .unwrap_or(false)
}

/// Walk `root`, emitting one [`FileRecord`] per regular file to `manifest_writer`,
/// backed by the hash cache at `conn`. The cache transaction is committed and
/// reopened every `flush_interval`, and force-committed once at the end.
///
/// Per-file open/hash errors are logged and skipped; the walk continues.
pub fn run_walk(
    root: &Path,
    conn: &mut Connection,
    manifest_writer: &mut impl Write,
    flush_interval: Duration,
) -> Result<WalkReport, BackupError> {
    let mut report = WalkReport::default();
    let mut clock = FlushClock::new(flush_interval);
    let mut txn = Txn::begin(conn)?;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("error walking {root:?}: {e}");
                report.files_skipped += 1;
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || should_skip_reserved(path) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("stat failed for {}: {e}", path.display());
                report.files_skipped += 1;
                continue;
            }
        };
        let size = meta.len();
        let mod_time = mtime_ns(&meta);
        let creation_time = creation_ns(&meta);
        let rel_path = to_posix(rel);
        let now = now_ns();

        let chunk_key = match cache::lookup(txn.as_connection(), &rel_path, mod_time, size, now)? {
            Some(key) => key,
            None => match hashing::hash_file(path, size) {
                Ok(digest) => {
                    let key = hashing::chunk_key_for_digest(&digest);
                    cache::insert(txn.as_connection(), &rel_path, mod_time, size, &key, now)?;
                    key
                }
                Err(e) => {
                    log::warn!("[Error] hashing {}: {e}", path.display());
                    report.files_skipped += 1;
                    continue;
                }
            },
        };

        let record = FileRecord {
            path: rel_path,
            chunk_key,
            size,
            mod_time,
            creation_time,
        };
        manifest::write_manifest_line(manifest_writer, &record)?;
        report.files_indexed += 1;

        if clock.should_flush() {
            txn.commit()?;
            manifest_writer
                .flush()
                .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
            txn = Txn::begin(conn)?;
            clock.reset();
        }
    }

    txn.commit()?;
    manifest_writer
        .flush()
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;

    Ok(report)
}

fn mtime_ns(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn creation_ns(meta: &std::fs::Metadata) -> i64 {
    meta.created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufWriter;

    #[test]
    fn reserved_names_are_skipped() {
        assert!(should_skip_reserved(Path::new(
            "/root/.__ossIndex_special_.cache.dat"
        )));
        assert!(!should_skip_reserved(Path::new("/root/a.txt")));
        assert!(!should_skip_reserved(Path::new(
            "/root/.__ossIndex_special_.cache.txt"
        )));
    }

    #[test]
    fn walk_indexes_files_and_skips_reserved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"world\n").unwrap();
        std::fs::write(
            dir.path().join(Consts::CACHE_FILENAME),
            b"not a real cache",
        )
        .unwrap();

        let mut conn = cache::open(&dir.path().join(Consts::CACHE_FILENAME).with_extension("test"))
            .unwrap_or_else(|_| rusqlite::Connection::open_in_memory().unwrap());
        let mut out = BufWriter::new(Vec::new());
        let report = run_walk(dir.path(), &mut conn, &mut out, Duration::from_secs(5)).unwrap();

        assert_eq!(report.files_indexed, 2);
        let manifest_bytes = out.into_inner().unwrap();
        let manifest_str = String::from_utf8(manifest_bytes).unwrap();
        assert_eq!(manifest_str.lines().count(), 2);
        assert!(!manifest_str.contains(Consts::CACHE_FILENAME));
    }

    #[test]
    fn second_walk_reuses_cache_on_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        let db_path = dir.path().join("cache.dat");

        let mut conn = cache::open(&db_path).unwrap();
        let mut out1 = BufWriter::new(Vec::new());
        run_walk(dir.path(), &mut conn, &mut out1, Duration::from_secs(5)).unwrap();

        let mut out2 = BufWriter::new(Vec::new());
        let report2 = run_walk(dir.path(), &mut conn, &mut out2, Duration::from_secs(5)).unwrap();
        assert_eq!(report2.files_indexed, 1);

        let manifest1 = String::from_utf8(out1.into_inner().unwrap()).unwrap();
        let manifest2 = String::from_utf8(out2.into_inner().unwrap()).unwrap();
        assert_eq!(manifest1, manifest2);
    }
}
