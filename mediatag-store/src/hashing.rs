//! SHA-256 content fingerprints for media files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, StoreError};

const CHUNK: usize = 64 * 1024;

/// Hex SHA-256 of the file's bytes, read in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<String, StoreError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let read = reader.read(&mut buf).map_err(|e| io_err(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Like [`hash_file`], but a failure is logged and yields an empty hash.
///
/// An empty hash never matches during move resolution, so the file is
/// still tracked, only without rename detection.
pub fn hash_file_or_empty(path: &Path) -> String {
    hash_file(path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "hashing failed, tracking without hash");
        String::new()
    })
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_hash_matches_byte_hash_across_chunks() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("big.bin");
        let bytes: Vec<u8> = (0..(CHUNK * 2 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &bytes).expect("write");

        assert_eq!(hash_file(&path).expect("hash"), hash_bytes(&bytes));
    }

    #[test]
    fn missing_file_hashes_to_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("gone.png");
        assert!(matches!(hash_file(&path), Err(StoreError::Io { .. })));
        assert_eq!(hash_file_or_empty(&path), "");
    }
}
