//! # Key Management
//!
//! Ed25519 keypairs, public keys and detached signatures for Minuto parties.
//!
//! Every creator, guarantor and holder owns exactly one keypair, derived
//! from their BIP-39 recovery seed (see [`identity`](crate::identity)).
//! Voucher creation data, guarantor attestations and every transaction
//! record are signed with it.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key bytes are never logged, and the `Debug` impls only print the
//!   public half.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,
}

/// A party's signing keypair.
///
/// `MinutoKeypair` intentionally does NOT implement `Serialize`. Nothing in
/// Minuto persists a private key: it is re-derived from the seed on unlock.
pub struct MinutoKeypair {
    signing_key: SigningKey,
}

/// The public half of a keypair. Safe to share; it is embedded in every id.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinutoPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
///
/// Transported as lowercase hex inside voucher records. A malformed hex
/// string never panics, it simply fails verification.
#[derive(Clone, PartialEq, Eq)]
pub struct MinutoSignature {
    bytes: [u8; 64],
}

impl MinutoKeypair {
    /// Generate a fresh keypair from the OS RNG. Only tests and benches use
    /// this; real parties always derive from a seed.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from 32 bytes of secret
    /// material. The caller is responsible for those bytes coming out of a
    /// proper KDF.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> MinutoPublicKey {
        MinutoPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Ed25519 is deterministic, so the same message always
    /// yields the same signature under the same key.
    pub fn sign(&self, message: &[u8]) -> MinutoSignature {
        MinutoSignature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &MinutoSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Unreduced, unclamped Curve25519 scalar bytes of the signing key, the
    /// input X25519 expects when reusing an Ed25519 identity for key
    /// agreement.
    pub(crate) fn x25519_scalar_bytes(&self) -> [u8; 32] {
        self.signing_key.to_scalar_bytes()
    }
}

impl Clone for MinutoKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for MinutoKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinutoKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// MinutoPublicKey
// ---------------------------------------------------------------------------

impl MinutoPublicKey {
    /// Validates that the bytes are a usable Ed25519 point.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Returns `true` if the signature is valid for `message`.
    pub fn verify(&self, message: &[u8], signature: &MinutoSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let dalek_sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    /// Birational map onto the Montgomery form, i.e. the X25519 public key
    /// matching [`MinutoKeypair::x25519_scalar_bytes`].
    pub(crate) fn to_x25519_bytes(&self) -> Result<[u8; 32], KeyError> {
        let vk = VerifyingKey::from_bytes(&self.bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(vk.to_montgomery().to_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Hash for MinutoPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for MinutoPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for MinutoPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinutoPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// MinutoSignature
// ---------------------------------------------------------------------------

impl MinutoSignature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded signature. Anything but 128 hex digits is rejected.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let raw = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        let bytes: [u8; 64] = raw.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self { bytes })
    }
}

impl fmt::Display for MinutoSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for MinutoSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "MinutoSignature({}...{})", &hex_str[..8], &hex_str[120..])
    }
}
