//! Content hash of asset files, encoded as a SHA-256 multihash.

use crate::error::ChecksumError;
use sha2::{Digest, Sha256};
use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

/// Multihash code (0x12) and digest length (0x20) of SHA-256.
const SHA256_MULTIHASH_PREFIX: &str = "1220";

/// Hex-encoded multihash of the SHA-256 digest of the file at `path`.
pub fn multihash_sha256(path: &Path) -> Result<String, ChecksumError> {
    let io_err = |source: io::Error| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{}{}", SHA256_MULTIHASH_PREFIX, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            multihash_sha256(&path).unwrap(),
            "1220ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = multihash_sha256(Path::new("/nonexistent/file.tif")).unwrap_err();
        assert!(matches!(err, ChecksumError::Io { .. }));
    }
}
