//! # Key Derivation
//!
//! Two independent key families:
//!
//! - **Password keys** stretch a low-entropy password with Argon2id and a
//!   random salt. They only ever wrap the profile record, so changing the
//!   password never touches a voucher file.
//! - **Seed keys** come from the BIP-39 seed through BLAKE3 `derive_key`.
//!   The seed already carries 256 bits of entropy and 2048 PBKDF2 rounds,
//!   so no further stretching is needed, and the result is deterministic:
//!   restore the seed on a new machine and every voucher file opens again.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{AES_KEY_LENGTH, FILE_KEY_CONTEXT, KDF_SALT_LENGTH, RECOVERY_KEY_CONTEXT};
use crate::crypto::hash::domain_separated_hash;
use crate::crypto::mnemonic::{seed_bytes, MnemonicError};

/// Errors from key derivation.
#[derive(Debug, Error)]
pub enum KdfError {
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    #[error(transparent)]
    Seed(#[from] MnemonicError),
}

/// Argon2id cost parameters. Persisted next to every password-wrapped
/// key so a profile opens with whatever it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Cheap parameters for tests and benches. Never use for real profiles.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, KdfError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(AES_KEY_LENGTH),
        )
        .map_err(|e| KdfError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, one lane.
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// Fresh random salt for [`password_key`].
pub fn random_salt() -> [u8; KDF_SALT_LENGTH] {
    let mut salt = [0u8; KDF_SALT_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Argon2id(password, salt) -> 256-bit key.
pub fn password_key(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, KdfError> {
    let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    params
        .argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| KdfError::HashingFailed(e.to_string()))?;
    Ok(key)
}

/// Key protecting the holder's local voucher files.
pub fn file_key_from_seed(seed: &str) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, KdfError> {
    let bip39_seed = seed_bytes(seed)?;
    Ok(Zeroizing::new(domain_separated_hash(
        FILE_KEY_CONTEXT,
        &bip39_seed[..],
    )))
}

/// Key of the profile's recovery slot: the seed acting as second password.
pub fn recovery_key_from_seed(seed: &str) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, KdfError> {
    let bip39_seed = seed_bytes(seed)?;
    Ok(Zeroizing::new(domain_separated_hash(
        RECOVERY_KEY_CONTEXT,
        &bip39_seed[..],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::mnemonic::generate_seed;

    #[test]
    fn password_key_is_deterministic_per_salt() {
        let params = KdfParams::insecure_fast();
        let salt = random_salt();
        let a = password_key("hunter2", &salt, &params).unwrap();
        let b = password_key("hunter2", &salt, &params).unwrap();
        assert_eq!(*a, *b);

        let other = password_key("hunter2", &random_salt(), &params).unwrap();
        assert_ne!(*a, *other);
    }

    #[test]
    fn different_passwords_different_keys() {
        let params = KdfParams::insecure_fast();
        let salt = [1u8; KDF_SALT_LENGTH];
        let a = password_key("correct horse", &salt, &params).unwrap();
        let b = password_key("battery staple", &salt, &params).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn broken_params_rejected() {
        let params = KdfParams {
            memory_kib: 0,
            iterations: 0,
            parallelism: 0,
        };
        assert!(matches!(
            password_key("pw", &[0u8; KDF_SALT_LENGTH], &params),
            Err(KdfError::InvalidParams(_))
        ));
    }

    #[test]
    fn seed_keys_are_deterministic_and_separated() {
        let seed = generate_seed().unwrap();
        let file_a = file_key_from_seed(&seed).unwrap();
        let file_b = file_key_from_seed(&seed.to_uppercase()).unwrap();
        let recovery = recovery_key_from_seed(&seed).unwrap();
        assert_eq!(*file_a, *file_b);
        assert_ne!(*file_a, *recovery);
    }
}
