//! Manifest store (C7): NDJSON line (de)serialization, and compress-upload /
//! fetch-decompress of a whole manifest under a timestamped key.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::codec;
use crate::config::Consts;
use crate::error::BackupError;
use crate::remote::ObjectStore;
use crate::types::FileRecord;

/// Serialize one [`FileRecord`] as a single JSON line, newline-terminated.
pub fn write_manifest_line(
    writer: &mut impl Write,
    record: &FileRecord,
) -> Result<(), BackupError> {
    let line = serde_json::to_string(record).map_err(|e| {
        BackupError::ManifestParseError(anyhow::Error::new(e))
    })?;
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.write_all(b"\n"))
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))
}

/// Iterate the non-empty lines of a manifest file, parsing each as a [`FileRecord`].
/// Empty lines are tolerated and skipped, per the manifest format's on-disk contract.
pub fn read_manifest_lines(
    path: &Path,
) -> Result<impl Iterator<Item = Result<FileRecord, BackupError>>, BackupError> {
    let file = File::open(path)
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e).context(format!("open {}", path.display()))))?;
    let reader = BufReader::with_capacity(Consts::MANIFEST_SCAN_BUFFER, file);
    Ok(reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(
            serde_json::from_str::<FileRecord>(&line)
                .map_err(|e| BackupError::ManifestParseError(anyhow::Error::new(e))),
        ),
        Err(e) => Some(Err(BackupError::LocalIOError(anyhow::Error::new(e)))),
    }))
}

/// Format the current instant as `YYYY-MM-DDTHH_MM_SS.fffffffffZZZZZZ`: ISO-8601 with
/// nanosecond precision and the colons in the time portion replaced by underscores
/// (filename-safe), per spec.md §6.
pub fn format_manifest_timestamp(now: OffsetDateTime) -> Result<String, BackupError> {
    let iso = now
        .format(&Rfc3339)
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
    // `Rfc3339` yields second precision; append the missing nanoseconds ourselves and
    // then apply the colon->underscore substitution to the time portion only.
    let (date_part, rest) = iso.split_once('T').unwrap_or((iso.as_str(), ""));
    let offset_start = rest
        .find(|c: char| c == '+' || c == '-' || c == 'Z')
        .unwrap_or(rest.len());
    let (time_part, offset_part) = rest.split_at(offset_start);
    let time_no_frac = time_part.split('.').next().unwrap_or(time_part);
    let nanos = now.nanosecond();
    let time_with_nanos = format!("{time_no_frac}.{nanos:09}");
    let safe_time = time_with_nanos.replace(':', "_");
    let offset_safe = offset_part.replace(':', "_");
    Ok(format!("{date_part}T{safe_time}{offset_safe}"))
}

/// Compress `local_path` and PUT it under `indexes/<ts>.dat.deflate`. Returns `<ts>`.
pub fn upload_manifest(
    store: &dyn ObjectStore,
    local_path: &Path,
    now: OffsetDateTime,
) -> Result<String, BackupError> {
    let ts = format_manifest_timestamp(now)?;
    let key = format!("{}{}.dat.deflate", Consts::MANIFEST_PREFIX, ts);
    let (tmp_path, _) = codec::compress(local_path)?;
    let put_result = store.put_object_from_file(&key, &tmp_path);
    let _ = std::fs::remove_file(&tmp_path);
    put_result?;
    Ok(ts)
}

/// GET `indexes/<ts>.dat.deflate` and decompress it to `dst_path`.
pub fn fetch_manifest(store: &dyn ObjectStore, ts: &str, dst_path: &Path) -> Result<(), BackupError> {
    let key = format!("{}{}.dat.deflate", Consts::MANIFEST_PREFIX, ts);
    let tmp = tempfile::NamedTempFile::new()
        .map_err(|e| BackupError::LocalIOError(anyhow::Error::new(e)))?;
    let tmp_path = tmp.into_temp_path();
    store.get_object_to_file(&key, &tmp_path)?;
    codec::decompress(&tmp_path, dst_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FsObjectStore;

    fn rec(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            chunk_key: "chunk/sha512/abc.deflate".to_string(),
            size: 6,
            mod_time: 1000,
            creation_time: 0,
        }
    }

    #[test]
    fn line_is_single_line_json_with_spec_keys() {
        let mut buf = Vec::new();
        write_manifest_line(&mut buf, &rec("a.txt")).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.ends_with('\n'));
        assert_eq!(s.matches('\n').count(), 1);
        let v: serde_json::Value = serde_json::from_str(s.trim_end()).unwrap();
        assert!(v.get("Path").is_some());
        assert!(v.get("ChunkKey").is_some());
        assert!(v.get("Size").is_some());
        assert!(v.get("ModTime").is_some());
        assert!(v.get("CreationTime").is_some());
    }

    #[test]
    fn read_manifest_lines_tolerates_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.ndjson");
        let mut f = File::create(&path).unwrap();
        write_manifest_line(&mut f, &rec("a.txt")).unwrap();
        f.write_all(b"\n").unwrap();
        write_manifest_line(&mut f, &rec("b.txt")).unwrap();
        drop(f);

        let records: Vec<FileRecord> = read_manifest_lines(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn upload_then_fetch_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("remote"));
        let local_path = dir.path().join("manifest.ndjson");
        let mut f = File::create(&local_path).unwrap();
        write_manifest_line(&mut f, &rec("a.txt")).unwrap();
        drop(f);

        let ts = upload_manifest(&store, &local_path, OffsetDateTime::UNIX_EPOCH).unwrap();
        let fetched_path = dir.path().join("fetched.ndjson");
        fetch_manifest(&store, &ts, &fetched_path).unwrap();

        let original = std::fs::read_to_string(&local_path).unwrap();
        let fetched = std::fs::read_to_string(&fetched_path).unwrap();
        assert_eq!(original, fetched);
    }

    #[test]
    fn timestamp_has_no_colons() {
        let ts = format_manifest_timestamp(OffsetDateTime::UNIX_EPOCH).unwrap();
        assert!(!ts.contains(':'));
    }
}
