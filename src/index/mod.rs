//! The two independently-queryable stores: a vector index for dense
//! similarity search and a metadata store for document/chunk records and
//! lexical search. Cross-store consistency is maintained by the ingestion
//! and deletion pipelines, not here.

pub mod metadata;
pub mod vector;

use sha1::{Digest, Sha1};

/// Derive the fixed-width vector index id for a chunk: the first 8 bytes
/// of sha1(chunk_id) as a big-endian signed 64-bit integer. Deterministic,
/// so redelivered ingestion jobs write the same ids.
pub fn vector_id(chunk_id: &str) -> i64 {
    let digest = Sha1::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id_is_stable() {
        assert_eq!(vector_id("doc__0"), vector_id("doc__0"));
        assert_ne!(vector_id("doc__0"), vector_id("doc__1"));
    }

    #[test]
    fn test_vector_id_known_value() {
        // sha1("abc") = a9993e36 4706816a ...
        assert_eq!(vector_id("abc"), i64::from_be_bytes([0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a]));
    }
}
