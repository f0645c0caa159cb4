//! Hasher (C2): SHA-512 hex digest of a file's content, and chunk-key formatting.

use anyhow::Context;
use memmap2::Mmap;
use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::config::Consts;
use crate::error::BackupError;

/// File size above which hashing uses memory-mapped I/O instead of chunked reads.
const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
/// Chunk size for buffered reads below the mmap threshold.
const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Hash `path`'s full byte content with SHA-512, returning the lowercase 128-char hex digest.
///
/// Uses memory-mapped I/O for files above [`HASH_MMAP_THRESHOLD`], chunked `BufReader`
/// reads otherwise — the same size-based split nefaxer's blake3 hasher uses, carried
/// over unchanged since it is an I/O-strategy choice independent of the digest algorithm.
pub fn hash_file(path: &Path, size: u64) -> Result<String, BackupError> {
    let inner = || -> anyhow::Result<String> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut hasher = Sha512::new();

        if size > HASH_MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file) }.context("mmap file")?;
            hasher.update(&mmap);
        } else {
            let mut reader = BufReader::with_capacity(HASH_READ_CHUNK_SIZE, file);
            let mut buffer = vec![0u8; HASH_READ_CHUNK_SIZE];
            loop {
                let n = reader.read(&mut buffer).context("read file")?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
        }

        Ok(hex::encode(hasher.finalize()))
    };
    inner().map_err(|source| BackupError::HashError {
        path: path.to_path_buf(),
        source,
    })
}

/// Derive the remote chunk key for a digest: `chunk/sha512/<hex>.deflate`.
pub fn chunk_key_for_digest(digest: &str) -> String {
    format!("{}{}.deflate", Consts::CHUNK_PREFIX, digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

    #[test]
    fn hashes_empty_file_to_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();
        let digest = hash_file(&path, 0).unwrap();
        assert_eq!(digest, EMPTY_SHA512);
    }

    #[test]
    fn chunk_key_matches_spec_format() {
        let key = chunk_key_for_digest(EMPTY_SHA512);
        assert_eq!(
            key,
            "chunk/sha512/cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e.deflate"
        );
    }

    #[test]
    fn identical_content_hashes_identically() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"hello\n").unwrap();
        std::fs::write(&b, b"hello\n").unwrap();
        assert_eq!(hash_file(&a, 6).unwrap(), hash_file(&b, 6).unwrap());
    }

    #[test]
    fn large_file_uses_mmap_path_and_still_matches_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.txt");
        std::fs::write(&path, b"x".repeat(4096)).unwrap();
        // Force through both code paths by lying about size relative to the threshold
        // and confirm they agree on content that fits comfortably either way.
        let via_chunked = hash_file(&path, 4096).unwrap();
        let via_mmap = hash_file(&path, HASH_MMAP_THRESHOLD + 1).unwrap();
        assert_eq!(via_chunked, via_mmap);
    }
}
