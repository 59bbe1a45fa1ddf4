//! # Recovery Seeds
//!
//! A party's recovery seed is a BIP-39 mnemonic. It is the root of the
//! signing key, of the voucher file key and of the profile recovery slot,
//! so losing the password is survivable and losing the seed is not.
//!
//! Seeds are normalized before use: lower-case, single spaces, no leading
//! or trailing whitespace. "Abandon  ABANDON ..." and "abandon abandon ..."
//! are the same seed.

use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::IDENTITY_DERIVATION_PATH;

type HmacSha512 = Hmac<Sha512>;

/// Errors arising from seed handling.
#[derive(Debug, Error)]
pub enum MnemonicError {
    #[error("invalid recovery seed: {0}")]
    InvalidMnemonic(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Generate a new 24-word mnemonic from 256 bits of OS entropy.
pub fn generate_seed() -> Result<String, MnemonicError> {
    let mut entropy = Zeroizing::new([0u8; 32]);
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut entropy[..]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..])
        .map_err(|e| MnemonicError::DerivationFailed(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Lower-case the phrase and collapse every whitespace run to one space.
pub fn normalize_seed(seed: &str) -> String {
    seed.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the (normalized) phrase is a valid BIP-39 mnemonic.
pub fn validate_seed(seed: &str) -> bool {
    Mnemonic::parse_normalized(&normalize_seed(seed)).is_ok()
}

/// BIP-39 seed bytes (PBKDF2-HMAC-SHA512, 2048 rounds, empty passphrase).
pub fn seed_bytes(seed: &str) -> Result<Zeroizing<[u8; 64]>, MnemonicError> {
    let mnemonic = Mnemonic::parse_normalized(&normalize_seed(seed))
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized("")))
}

/// Derive the 32-byte Ed25519 secret of the identity.
///
/// HMAC-SHA512 keyed by the derivation path over the BIP-39 seed; the
/// first half of the MAC becomes the signing key.
pub fn identity_secret(seed: &str) -> Result<Zeroizing<[u8; 32]>, MnemonicError> {
    let bip39_seed = seed_bytes(seed)?;

    let mut mac = HmacSha512::new_from_slice(IDENTITY_DERIVATION_PATH.as_bytes())
        .map_err(|e| MnemonicError::DerivationFailed(e.to_string()))?;
    mac.update(&bip39_seed[..]);
    let result = mac.finalize().into_bytes();

    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&result[..32]);
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SEED: &str = "abandon abandon abandon abandon abandon abandon \
                             abandon abandon abandon abandon abandon about";

    #[test]
    fn generate_produces_24_valid_words() {
        let seed = generate_seed().unwrap();
        assert_eq!(seed.split_whitespace().count(), 24);
        assert!(validate_seed(&seed));
    }

    #[test]
    fn normalization_collapses_case_and_spacing() {
        assert_eq!(normalize_seed("  Abandon\tABOUT \n  zoo "), "abandon about zoo");
    }

    #[test]
    fn derivation_ignores_case_and_spacing() {
        let messy = TEST_SEED.to_uppercase().replace(' ', "   ");
        assert_eq!(
            *identity_secret(TEST_SEED).unwrap(),
            *identity_secret(&messy).unwrap()
        );
    }

    #[test]
    fn invalid_phrase_rejected() {
        assert!(!validate_seed("definitely not a mnemonic"));
        assert!(matches!(
            identity_secret("abandon abandon abandon"),
            Err(MnemonicError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn different_seeds_different_secrets() {
        let a = generate_seed().unwrap();
        let b = generate_seed().unwrap();
        assert_ne!(*identity_secret(&a).unwrap(), *identity_secret(&b).unwrap());
    }
}
