//! Hash cache (C3): persistent `(path, mod_time, size) -> sha512` table with a
//! time-based transactional flush cadence.
//!
//! The cache DB is owned solely by the walker thread; callers must serialise access
//! (this crate never touches the handle from more than one thread).

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::BackupError;

/// WAL tuning pragmas, applied once after enabling WAL mode.
const WAL_PRAGMAS: &str = r#"
    PRAGMA synchronous = NORMAL;
    PRAGMA wal_autocheckpoint = 10000;
    PRAGMA journal_size_limit = 67108864;
    "#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    path TEXT NOT NULL,
    mod_time INTEGER NOT NULL,
    size INTEGER NOT NULL,
    sha512 TEXT NOT NULL,
    last_seen_time INTEGER NOT NULL,
    PRIMARY KEY (path, mod_time, size)
);
"#;

/// Open or create the hash cache at `path`, enabling WAL mode and bulk-insert pragmas.
pub fn open(path: &Path) -> Result<Connection, BackupError> {
    let inner = || -> anyhow::Result<Connection> {
        let conn = Connection::open(path)
            .with_context(|| format!("open hash cache at {}", path.display()))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .context("enable WAL")?;
        conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(conn)
    };
    inner().map_err(BackupError::CacheIOError)
}

/// Look up a cached digest for `(path, mod_time, size)`. On hit, advances `last_seen_time`.
pub fn lookup(
    conn: &Connection,
    path: &str,
    mod_time: i64,
    size: u64,
    now: i64,
) -> Result<Option<String>, BackupError> {
    let inner = || -> anyhow::Result<Option<String>> {
        let hit: Option<String> = conn
            .query_row(
                "SELECT sha512 FROM cache_entries WHERE path = ?1 AND mod_time = ?2 AND size = ?3",
                (path, mod_time, size as i64),
                |row| row.get(0),
            )
            .optional()
            .context("lookup cache entry")?;
        if hit.is_some() {
            conn.execute(
                "UPDATE cache_entries SET last_seen_time = ?1 \
                 WHERE path = ?2 AND mod_time = ?3 AND size = ?4",
                (now, path, mod_time, size as i64),
            )
            .context("advance last_seen_time")?;
        }
        Ok(hit)
    };
    inner().map_err(BackupError::CacheIOError)
}

/// Insert a new cache entry. A conflict on the unique key is a no-op (`INSERT OR IGNORE`):
/// the walker only calls this on a prior miss, so a race would mean another writer beat
/// us to the same fact, which is harmless to ignore.
pub fn insert(
    conn: &Connection,
    path: &str,
    mod_time: i64,
    size: u64,
    sha512: &str,
    now: i64,
) -> Result<(), BackupError> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_entries (path, mod_time, size, sha512, last_seen_time) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (path, mod_time, size as i64, sha512, now),
    )
    .context("insert cache entry")
    .map_err(BackupError::CacheIOError)?;
    Ok(())
}

/// Explicit batching boundary around the walker's single open transaction.
///
/// All reads and writes for one walk run inside one transaction, committed and reopened
/// on [`FlushClock::should_flush`]'s cadence (~5s wall-clock), and force-committed once
/// at end of walk. A crash mid-walk loses at most the last flush interval's inserts —
/// acceptable, since the next run simply re-hashes those files.
pub struct Txn<'conn> {
    inner: Option<Transaction<'conn>>,
}

impl<'conn> Txn<'conn> {
    pub fn begin(conn: &'conn mut Connection) -> Result<Self, BackupError> {
        let tx = conn
            .transaction()
            .context("begin cache transaction")
            .map_err(BackupError::CacheIOError)?;
        Ok(Self { inner: Some(tx) })
    }

    pub fn as_connection(&self) -> &Connection {
        self.inner.as_ref().expect("transaction already committed")
    }

    pub fn commit(mut self) -> Result<(), BackupError> {
        self.inner
            .take()
            .expect("transaction already committed")
            .commit()
            .context("commit cache transaction")
            .map_err(BackupError::CacheIOError)
    }
}

/// Tracks wall-clock time since the last cache flush, so the walker can commit and
/// reopen its transaction on a fixed cadence instead of per file or per count.
pub struct FlushClock {
    interval: Duration,
    last_flush: Instant,
}

impl FlushClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: Instant::now(),
        }
    }

    pub fn should_flush(&self) -> bool {
        self.last_flush.elapsed() >= self.interval
    }

    pub fn reset(&mut self) {
        self.last_flush = Instant::now();
    }
}
