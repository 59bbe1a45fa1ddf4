//! # Hashing Utilities
//!
//! - **SHA-256** (doubled) names transaction records: `t_id` is the hex
//!   double-SHA-256 of the record's signable bytes.
//! - **BLAKE3** does everything else: fingerprints, local voucher ids and
//!   keyed derivation through `derive_key` contexts.

use sha2::{Digest, Sha256};

/// SHA-256 of the input as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// BLAKE3 digest.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 over several parts, each prefixed by its little-endian length so
/// `("ab", "c")` and `("a", "bc")` hash differently.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// BLAKE3 in key-derivation mode. The context string must be hardcoded,
/// globally unique and application specific (see the `*_CONTEXT` constants
/// in [`config`](crate::config)).
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_double_sha256_differs_from_single() {
        assert_ne!(double_sha256(b"minuto"), sha256(b"minuto"));
        assert_eq!(double_sha256(b"minuto"), sha256(&sha256(b"minuto")));
    }

    #[test]
    fn test_domain_separation() {
        let a = domain_separated_hash("minuto test context a", b"seed");
        let b = domain_separated_hash("minuto test context b", b"seed");
        assert_ne!(a, b);
        assert_ne!(a, blake3_hash(b"seed"));
    }

    #[test]
    fn test_blake3_hash_multi_is_length_prefixed() {
        assert_ne!(
            blake3_hash_multi(&[b"ab", b"c"]),
            blake3_hash_multi(&[b"a", b"bc"])
        );
    }
}
