//! Compression and integrity digest for stored state payloads
//!
//! State is stored gzip-compressed to stay under the size limit the API
//! server places on secret values. The MD5 digest travels alongside the
//! decompressed payload so callers can detect corruption; it is an
//! integrity signal, not a security measure.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use md5::{Digest, Md5};
use thiserror::Error;

/// Error produced when a payload cannot be compressed or decompressed
#[derive(Debug, Error)]
#[error("state payload codec error: {0}")]
pub struct CodecError(#[from] std::io::Error);

/// Compress a state payload with gzip
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a stored state payload
///
/// Fails if the input is not a valid gzip stream (a corrupt or truncated
/// secret value).
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// MD5 digest of a decompressed payload
pub fn digest(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = b"resource \"example\" { count = 3 }".to_vec();
        let compressed = compress(&payload).unwrap();
        assert_ne!(compressed, payload);
        assert_eq!(decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn test_round_trip_empty() {
        let compressed = compress(b"").unwrap();
        assert_eq!(decompress(&compressed).unwrap(), b"");
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let result = decompress(b"this is not a gzip stream");
        assert!(result.is_err());
    }

    #[test]
    fn test_decompress_rejects_truncated() {
        let compressed = compress(b"some state that will be cut short").unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        assert!(decompress(truncated).is_err());
    }

    #[test]
    fn test_digest_stable() {
        assert_eq!(digest(b"hello"), digest(b"hello"));
        assert_ne!(digest(b"hello"), digest(b"world"));
    }

    #[test]
    fn test_digest_known_value() {
        // md5("hello") = 5d41402abc4b2a76b9719d911017c592
        let expected: [u8; 16] = [
            0x5d, 0x41, 0x40, 0x2a, 0xbc, 0x4b, 0x2a, 0x76, 0xb9, 0x71, 0x9d, 0x91, 0x10, 0x17,
            0xc5, 0x92,
        ];
        assert_eq!(digest(b"hello"), expected);
    }
}
