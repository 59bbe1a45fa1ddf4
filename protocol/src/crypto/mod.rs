//! # Cryptographic Primitives for Minuto
//!
//! Every signature, hash, derived key and ciphertext in Minuto flows through
//! here. All of it is a thin, type-safe wrapper around audited crates:
//!
//! - **Ed25519** for identity signatures.
//! - **X25519** (from the same identity keys) for exchange-file keys.
//! - **AES-256-GCM** for every file at rest.
//! - **Argon2id** for password keys, **BIP-39** for recovery seeds.
//! - **BLAKE3** / **SHA-256** for hashing and key derivation.

pub mod encryption;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod mnemonic;
pub mod shared;

pub use encryption::{decrypt, encrypt, EncryptionError};
pub use hash::{blake3_hash, double_sha256, sha256};
pub use kdf::{KdfError, KdfParams};
pub use keys::{KeyError, MinutoKeypair, MinutoPublicKey, MinutoSignature};
pub use mnemonic::{generate_seed, normalize_seed, validate_seed, MnemonicError};
pub use shared::{shared_key, SharedKeyError};
