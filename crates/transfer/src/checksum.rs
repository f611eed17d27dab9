use std::io;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Error returned when a locally computed digest differs from the remote one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checksum mismatch: local '{local}', remote '{remote}'")]
pub struct ChecksumError {
    pub local: String,
    pub remote: String,
}

/// Computes SHA-256 of `data` and returns the lowercase hex digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Reads `reader` to EOF and returns the lowercase hex SHA-256 digest.
///
/// The reader is left at EOF; rewinding it before reuse is the caller's job.
pub async fn checksum_reader<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compares two hex digests byte for byte.
///
/// Case matters: the catalog reports lowercase hex and so do we.
pub fn verify_checksum(local: &str, remote: &str) -> Result<(), ChecksumError> {
    if local == remote {
        Ok(())
    } else {
        Err(ChecksumError {
            local: local.to_string(),
            remote: remote.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TEST_INPUT_DIGEST: &str =
        "b5a7e3884f760b197b8e9df98bab2d35333943bc7439e0bba00ed87213a44f43";

    #[test]
    fn checksum_bytes_known_vector() {
        assert_eq!(checksum_bytes(b"testinputdata"), TEST_INPUT_DIGEST);
    }

    #[test]
    fn checksum_bytes_is_lowercase_hex() {
        let c = checksum_bytes(b"hello world");
        assert_eq!(c.len(), 64);
        assert!(c.chars().all(|ch| ch.is_ascii_digit() || ch.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn checksum_reader_known_vector() {
        let mut r = Cursor::new(b"testinputdata".to_vec());
        let digest = checksum_reader(&mut r).await.unwrap();
        assert_eq!(digest, TEST_INPUT_DIGEST);
    }

    #[tokio::test]
    async fn checksum_reader_spans_multiple_buffers() {
        let data = vec![7u8; READ_BUF_SIZE * 3 + 17];
        let mut r = Cursor::new(data.clone());
        let digest = checksum_reader(&mut r).await.unwrap();
        assert_eq!(digest, checksum_bytes(&data));
        assert_eq!(r.position(), data.len() as u64);
    }

    #[tokio::test]
    async fn checksum_reader_empty_input() {
        let mut r = Cursor::new(Vec::new());
        let digest = checksum_reader(&mut r).await.unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_checksum_equal() {
        assert!(verify_checksum(TEST_INPUT_DIGEST, TEST_INPUT_DIGEST).is_ok());
    }

    #[test]
    fn verify_checksum_is_case_sensitive() {
        let upper = TEST_INPUT_DIGEST.to_uppercase();
        let err = verify_checksum(TEST_INPUT_DIGEST, &upper).unwrap_err();
        assert_eq!(err.local, TEST_INPUT_DIGEST);
        assert_eq!(err.remote, upper);
    }
}
