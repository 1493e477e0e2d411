//! Download-to-temp plus the optional streamed checksum verification of §4.7 steps 4-5.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::client::{ClientError, FleetClient};
use crate::error::UpdateError;

const VERIFY_CHUNK_SIZE: usize = 64 * 1024;

pub fn download(client: &FleetClient, download_url: &str, dest: &Path) -> Result<u64, UpdateError> {
    client
        .download_to(download_url, dest)
        .map_err(|err| match err {
            ClientError::Transport { .. } | ClientError::Status { .. } => {
                UpdateError::Download(err.to_string())
            }
            other => UpdateError::Download(other.to_string()),
        })
}

/// Reads `path` in fixed-size chunks, hashing as it goes rather than buffering the whole
/// file, and compares the digest against `expected` (lowercase hex, as the catalog
/// stores it).
pub fn verify_checksum(path: &Path, expected: &str, product: &str, version: &str) -> Result<(), UpdateError> {
    let mut file = File::open(path).map_err(|e| UpdateError::Fs(e.to_string()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; VERIFY_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buf).map_err(|e| UpdateError::Fs(e.to_string()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    let actual = hex::encode(hasher.finalize());
    if actual != expected {
        return Err(UpdateError::ChecksumMismatch {
            product: product.to_string(),
            version: version.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_verify_checksum_accepts_matching_digest() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("artifact");
        std::fs::write(&path, b"binary contents").unwrap();

        let expected = format!("{:x}", Sha256::digest(b"binary contents"));
        verify_checksum(&path, &expected, "siemcore-api", "v1.5.0").unwrap();
    }

    #[test]
    fn test_verify_checksum_rejects_mismatch() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("artifact");
        std::fs::write(&path, b"binary contents").unwrap();

        let err = verify_checksum(&path, "0000", "siemcore-api", "v1.5.0").unwrap_err();
        assert_matches!(err, UpdateError::ChecksumMismatch { .. });
    }
}
