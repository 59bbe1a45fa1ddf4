//! # Identity Module
//!
//! A Minuto party is one Ed25519 keypair, derived from a BIP-39 recovery
//! seed, plus two things computed from its public key:
//!
//! 1. **ID**: Bech32 `minuto1...` string carrying the full public key (see
//!    [`minuto_id`]). This is what voucher records store for creators,
//!    guarantors, senders and recipients.
//! 2. **Fingerprint**: first 8 bytes of BLAKE3(public key), for humans
//!    comparing keys over the phone.
//!
//! [`Identity`] only decides *who* signs. What gets signed is defined by
//! the voucher and transaction modules.

pub mod minuto_id;
pub mod person;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{AES_KEY_LENGTH, FINGERPRINT_LENGTH};
use crate::crypto::hash::blake3_hash;
use crate::crypto::keys::{MinutoKeypair, MinutoPublicKey, MinutoSignature};
use crate::crypto::mnemonic::{generate_seed, identity_secret, MnemonicError};
use crate::crypto::shared::{shared_key, SharedKeyError};
use crate::error::ErrorCategory;

pub use minuto_id::{decode_id, encode_id, MinutoIdError};
pub use person::{Gender, GuarantorInfo, PersonInfo};

/// Errors from identity derivation and id handling.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("invalid id: {0}")]
    InvalidId(#[from] MinutoIdError),

    #[error("key agreement failed: {0}")]
    KeyAgreement(#[from] SharedKeyError),
}

impl IdentityError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IdentityError::InvalidSeed(_) => ErrorCategory::State,
            IdentityError::InvalidId(_) | IdentityError::KeyAgreement(_) => {
                ErrorCategory::Cryptographic
            }
        }
    }
}

impl From<MnemonicError> for IdentityError {
    fn from(e: MnemonicError) -> Self {
        IdentityError::InvalidSeed(e.to_string())
    }
}

/// A party's signing identity.
///
/// Created once from a seed and immutable afterwards. Cloning is allowed
/// (the session and a bench may both need one) but every clone is another
/// copy of the secret key in memory.
#[derive(Clone)]
pub struct Identity {
    id: String,
    fingerprint: [u8; FINGERPRINT_LENGTH],
    keypair: MinutoKeypair,
}

impl Identity {
    /// Derive the identity for a recovery seed. The same seed (modulo case
    /// and whitespace) always yields the same id and keypair.
    ///
    /// # Errors
    ///
    /// `InvalidSeed` if the phrase is not a valid BIP-39 mnemonic.
    pub fn derive(seed: &str) -> Result<Self, IdentityError> {
        let secret = identity_secret(seed)?;
        Self::from_keypair(MinutoKeypair::from_seed(&secret))
    }

    /// Fresh identity with a newly generated seed. Returns the seed so the
    /// caller can show it to the user exactly once.
    pub fn generate() -> Result<(Self, String), IdentityError> {
        let seed = generate_seed()?;
        let identity = Self::derive(&seed)?;
        Ok((identity, seed))
    }

    pub fn from_keypair(keypair: MinutoKeypair) -> Result<Self, IdentityError> {
        let public_key = keypair.public_key();
        let id = encode_id(&public_key)?;
        let mut fingerprint = [0u8; FINGERPRINT_LENGTH];
        fingerprint.copy_from_slice(&blake3_hash(public_key.as_bytes())[..FINGERPRINT_LENGTH]);
        Ok(Self {
            id,
            fingerprint,
            keypair,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fingerprint(&self) -> &[u8; FINGERPRINT_LENGTH] {
        &self.fingerprint
    }

    /// Fingerprint as `xxxx-xxxx-xxxx-xxxx` for reading aloud.
    pub fn fingerprint_display(&self) -> String {
        self.fingerprint
            .chunks(2)
            .map(hex::encode)
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn public_key(&self) -> MinutoPublicKey {
        self.keypair.public_key()
    }

    pub fn sign(&self, payload: &[u8]) -> MinutoSignature {
        self.keypair.sign(payload)
    }

    /// Check `signature` over `payload` against the key embedded in `id`.
    /// An undecodable id is simply a failed verification.
    pub fn verify(id: &str, payload: &[u8], signature: &MinutoSignature) -> bool {
        match decode_id(id) {
            Ok(pk) => pk.verify(payload, signature),
            Err(_) => false,
        }
    }

    /// [`Identity::verify`] for hex-encoded signatures as stored in records.
    pub fn verify_hex(id: &str, payload: &[u8], signature_hex: &str) -> bool {
        match MinutoSignature::from_hex(signature_hex) {
            Ok(sig) => Self::verify(id, payload, &sig),
            Err(_) => false,
        }
    }

    /// Symmetric key shared with the party behind `peer_id`.
    pub fn shared_key_with(
        &self,
        peer_id: &str,
    ) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, IdentityError> {
        let peer = decode_id(peer_id)?;
        Ok(shared_key(&self.keypair, &peer)?)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity({})", self.id)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}
