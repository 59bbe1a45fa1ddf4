//! # Storage Module
//!
//! Everything that touches the disk: encrypted voucher files, the
//! password-protected profile and files exchanged between two parties.
//!
//! ```text
//! envelope.rs      Ciphertext marker and header framing
//! secure_store.rs  SecureStore: atomic writes, voucher files, exchange files
//! profile.rs       Profile file and the unlocked Session
//! ```
//!
//! ## Keys
//!
//! | Key | Derived from | Protects |
//! |-----|--------------|----------|
//! | password key | Argon2id(password, salt) | profile data key |
//! | recovery key | BLAKE3-KDF(seed) | profile data key (second slot) |
//! | file key | BLAKE3-KDF(seed) | the holder's voucher files |
//! | shared key | X25519(own key, peer key) | exchange files between two parties |

pub mod envelope;
pub mod profile;
pub mod secure_store;

pub use envelope::{EnvelopeError, EnvelopeMode};
pub use profile::{ImportOutcome, ProfileError, ProfileRecord, Session, TrashResult};
pub use secure_store::{ExchangePayload, SecureStore, StoreError};
