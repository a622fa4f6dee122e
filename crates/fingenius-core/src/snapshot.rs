//! Binary snapshot codec for a [`VectorIndex`].
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//! 0       4     magic  b"FGVS"
//! 4       2     format version, little-endian u16
//! 6       32    SHA-256 of the payload
//! 38      ..    bincode-encoded VectorIndex
//! ```
//!
//! The snapshot is a private artifact of this crate, not an interchange
//! format. Decoding validates every header field and the checksum before
//! touching the payload, then checks that every vector matches the
//! recorded dimensionality.

use sha2::{Digest, Sha256};

use crate::error::FormatError;
use crate::index::VectorIndex;

pub const MAGIC: &[u8; 4] = b"FGVS";
pub const FORMAT_VERSION: u16 = 1;

const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 2 + CHECKSUM_LEN;

/// Serialize an index into snapshot bytes.
pub fn encode(index: &VectorIndex) -> Result<Vec<u8>, FormatError> {
    let payload = bincode::serialize(index).map_err(|e| FormatError::Encode(e.to_string()))?;
    let checksum = Sha256::digest(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse snapshot bytes back into an index.
pub fn decode(bytes: &[u8]) -> Result<VectorIndex, FormatError> {
    if bytes.len() < HEADER_LEN {
        // A short file with the wrong magic is foreign rather than truncated.
        if !bytes.is_empty() && !MAGIC.starts_with(&bytes[..bytes.len().min(MAGIC.len())]) {
            return Err(FormatError::BadMagic);
        }
        return Err(FormatError::Truncated { len: bytes.len() });
    }

    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(FormatError::BadMagic);
    }

    let (version, rest) = rest.split_at(2);
    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let (checksum, payload) = rest.split_at(CHECKSUM_LEN);
    if Sha256::digest(payload).as_slice() != checksum {
        return Err(FormatError::ChecksumMismatch);
    }

    let index: VectorIndex =
        bincode::deserialize(payload).map_err(|e| FormatError::Decode(e.to_string()))?;

    if let Some(bad) = index.entries().iter().find(|e| e.vector.len() != index.dims()) {
        return Err(FormatError::Inconsistent(format!(
            "entry {} has {} dimensions, header says {}",
            bad.id,
            bad.vector.len(),
            index.dims()
        )));
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn sample() -> VectorIndex {
        let chunks = (0..5)
            .map(|i| Chunk {
                source: format!("doc-{}.pdf", i % 2),
                chunk_index: i,
                text: format!("clause {}", i),
                hash: format!("{:064}", i),
            })
            .collect();
        let vectors = (0..5)
            .map(|i| vec![i as f32, 1.0, (5 - i) as f32, 0.5])
            .collect();
        VectorIndex::from_embeddings("all-minilm-l6-v2", 4, chunks, vectors).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_entries_and_results() {
        let index = sample();
        let bytes = encode(&index).unwrap();
        let restored = decode(&bytes).unwrap();

        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.model(), "all-minilm-l6-v2");
        assert_eq!(restored.dims(), 4);

        let probe = [2.0, 0.5, 1.0, 0.0];
        let before = index.search(&probe, 3).unwrap();
        let after = restored.search(&probe, 3).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_index_round_trips() {
        let index = VectorIndex::new("m", 8);
        assert_eq!(decode(&encode(&index).unwrap()).unwrap(), index);
    }

    #[test]
    fn test_empty_file_is_truncated() {
        assert_eq!(decode(&[]), Err(FormatError::Truncated { len: 0 }));
    }

    #[test]
    fn test_truncated_file() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(
            decode(&bytes[..10]),
            Err(FormatError::Truncated { len: 10 })
        );
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(FormatError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_foreign_file_rejected() {
        // A Python pickle header, as written by older tooling.
        let pickle = b"\x80\x04\x95\x1a\x00\x00\x00\x00\x00\x00\x00\x8c\x08builtins\x94\x8c\x04dict\x94\x93\x94)R\x94.";
        assert_eq!(decode(pickle), Err(FormatError::BadMagic));
        assert_eq!(decode(b"{}"), Err(FormatError::BadMagic));
    }

    #[test]
    fn test_flipped_payload_byte_detected() {
        let mut bytes = encode(&sample()).unwrap();
        let last = bytes.len() - 3;
        bytes[last] ^= 0xff;
        assert_eq!(decode(&bytes), Err(FormatError::ChecksumMismatch));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[4..6].copy_from_slice(&7u16.to_le_bytes());
        assert_eq!(decode(&bytes), Err(FormatError::UnsupportedVersion(7)));
    }
}
