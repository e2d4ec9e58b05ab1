//! On-disk entry file format.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "UCA1"
//! 4       8     creation time, epoch ms (u64 LE)
//! 12      8     payload length (u64 LE)
//! 20      32    SHA-256 of payload
//! 52      n     payload
//! ```
//!
//! Every read validates length and checksum, so a truncated or bit-rotted
//! file is detected and treated as a miss.

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"UCA1";
pub const HEADER_LEN: usize = 4 + 8 + 8 + 32;

/// Parsed entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub created_ms: u64,
    pub payload_len: u64,
    pub checksum: [u8; 32],
}

/// Why an entry file failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryFileError {
    #[error("file too short ({0} bytes)")]
    TooShort(usize),

    #[error("bad magic")]
    BadMagic,

    #[error("payload length mismatch: header says {expected}, found {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("payload checksum mismatch")]
    ChecksumMismatch,
}

/// Serialize an entry.
pub fn encode(created_ms: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&created_ms.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&Sha256::digest(payload));
    out.extend_from_slice(payload);
    out
}

/// Parse only the header.
pub fn decode_header(bytes: &[u8]) -> Result<EntryHeader, EntryFileError> {
    if bytes.len() < HEADER_LEN {
        return Err(EntryFileError::TooShort(bytes.len()));
    }
    if &bytes[0..4] != MAGIC {
        return Err(EntryFileError::BadMagic);
    }

    let mut u64_buf = [0u8; 8];
    u64_buf.copy_from_slice(&bytes[4..12]);
    let created_ms = u64::from_le_bytes(u64_buf);
    u64_buf.copy_from_slice(&bytes[12..20]);
    let payload_len = u64::from_le_bytes(u64_buf);
    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&bytes[20..HEADER_LEN]);

    Ok(EntryHeader {
        created_ms,
        payload_len,
        checksum,
    })
}

/// Validate a whole file and return its header.
///
/// The payload is `bytes[HEADER_LEN..]` on success.
pub fn decode(bytes: &[u8]) -> Result<EntryHeader, EntryFileError> {
    let header = decode_header(bytes)?;
    let actual = (bytes.len() - HEADER_LEN) as u64;
    if actual != header.payload_len {
        return Err(EntryFileError::LengthMismatch {
            expected: header.payload_len,
            actual,
        });
    }
    if Sha256::digest(&bytes[HEADER_LEN..]).as_slice() != header.checksum.as_slice() {
        return Err(EntryFileError::ChecksumMismatch);
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode() {
        let file = encode(1_700_000_000_000, b"artifact");

        assert_eq!(file.len(), HEADER_LEN + 8);
        let header = decode(&file).unwrap();
        assert_eq!(header.created_ms, 1_700_000_000_000);
        assert_eq!(header.payload_len, 8);
        assert_eq!(&file[HEADER_LEN..], b"artifact");
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let file = encode(0, b"");
        assert_eq!(decode(&file).unwrap().payload_len, 0);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let file = encode(1, b"artifact");
        assert_eq!(
            decode(&file[..HEADER_LEN - 1]),
            Err(EntryFileError::TooShort(HEADER_LEN - 1))
        );
        assert_eq!(
            decode(&file[..file.len() - 2]),
            Err(EntryFileError::LengthMismatch {
                expected: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut file = encode(1, b"artifact");
        file[0] = b'X';
        assert_eq!(decode(&file), Err(EntryFileError::BadMagic));
    }

    #[test]
    fn test_flipped_payload_bit_rejected() {
        let mut file = encode(1, b"artifact");
        let last = file.len() - 1;
        file[last] ^= 0x01;
        assert_eq!(decode(&file), Err(EntryFileError::ChecksumMismatch));
    }
}
