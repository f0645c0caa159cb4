//! Chunk codec (C1): stream-compress a file to a temp artifact, stream-decompress back.
//!
//! DEFLATE level is fixed per release and never recorded: chunk keys are content-addressed
//! by the uncompressed bytes, so decoders never need to know the level used to produce them.

use anyhow::Context;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::BackupError;

const COMPRESSION_LEVEL: u32 = 2;

/// Compress `src_path` through a raw DEFLATE stream into a fresh temp file.
///
/// Returns the temp file's path and its compressed byte length. The caller owns the
/// temp file and is responsible for deleting it once done (PUT, then remove).
pub fn compress(src_path: &Path) -> Result<(PathBuf, u64), BackupError> {
    let inner = || -> anyhow::Result<(PathBuf, u64)> {
        let src = File::open(src_path)
            .with_context(|| format!("open {}", src_path.display()))?;
        let mut reader = BufReader::new(src);

        let tmp = tempfile::NamedTempFile::new().context("create temp artifact")?;
        let (file, tmp_path) = tmp.into_parts();
        {
            let writer = BufWriter::new(&file);
            let mut encoder = DeflateEncoder::new(writer, Compression::new(COMPRESSION_LEVEL));
            io::copy(&mut reader, &mut encoder).context("compress stream")?;
            encoder.try_finish().context("finish compression")?;
        }
        file.sync_all().context("flush temp artifact")?;
        let compressed_size = file.metadata().context("stat temp artifact")?.len();
        let persisted = tmp_path.keep().context("persist temp artifact")?;
        Ok((persisted, compressed_size))
    };
    inner().map_err(BackupError::CompressionError)
}

/// Decompress `src_path` (a raw DEFLATE stream) into `dst_path`.
///
/// Parent directories are created with permissive mode. `dst_path` is opened with
/// exclusive create: an existing destination is never overwritten, and that failure
/// is reported as [`BackupError::RestoreTargetExists`] rather than a generic I/O error.
pub fn decompress(src_path: &Path, dst_path: &Path) -> Result<(), BackupError> {
    if let Some(parent) = dst_path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all_permissive(parent)
            .map_err(BackupError::CompressionError)?;
    }

    let dst = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst_path)
    {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(BackupError::RestoreTargetExists(dst_path.to_path_buf()));
        }
        Err(e) => {
            return Err(BackupError::CompressionError(
                anyhow::Error::new(e).context(format!("create {}", dst_path.display())),
            ));
        }
    };

    let inner = || -> anyhow::Result<()> {
        let src = File::open(src_path).with_context(|| format!("open {}", src_path.display()))?;
        let mut decoder = DeflateDecoder::new(BufReader::new(src));
        let mut writer = BufWriter::new(&dst);
        io::copy(&mut decoder, &mut writer).context("decompress stream")?;
        writer.flush().context("flush destination")?;
        Ok(())
    };
    if let Err(e) = inner() {
        let _ = std::fs::remove_file(dst_path);
        return Err(BackupError::CompressionError(e));
    }
    Ok(())
}

#[cfg(unix)]
fn create_dir_all_permissive(dir: &Path) -> anyhow::Result<()> {
    use std::fs::DirBuilder;
    use std::os::unix::fs::DirBuilderExt;
    DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .with_context(|| format!("create directory {}", dir.display()))
}

#[cfg(not(unix))]
fn create_dir_all_permissive(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}
