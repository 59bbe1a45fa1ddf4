//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for everything Minuto writes to disk: the
//! profile record, local voucher files and voucher files exchanged between
//! two parties.
//!
//! ## Nonce management
//!
//! GCM does not forgive nonce reuse. Every call draws a fresh random 96-bit
//! nonce from `OsRng`; a profile writes a handful of files per session, far
//! below the ~2^48 birthday bound.
//!
//! ## Wire format
//!
//! [`encrypt`] and [`encrypt_with_aad`] return `nonce || ciphertext` as a
//! single `Vec<u8>`. The first 12 bytes are the nonce, the rest is the
//! ciphertext plus the 16-byte tag. The decrypt functions expect the same
//! layout. Framing (markers, header fields) belongs to
//! [`storage::envelope`](crate::storage::envelope), which passes its header
//! in as AAD so it cannot be swapped without breaking the tag.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};
use crate::error::ErrorCategory;

/// Errors that can occur during encryption/decryption.
///
/// Deliberately vague: "wrong key" and "corrupted ciphertext" look the
/// same from the outside.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {AES_NONCE_LENGTH} bytes")]
    CiphertextTooShort,
}

impl EncryptionError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Cryptographic
    }
}

/// Encrypt plaintext with AES-256-GCM using a random nonce.
///
/// Returns `nonce || ciphertext`.
///
/// # Example
///
/// ```
/// use minuto_protocol::crypto::encryption::{decrypt, encrypt};
///
/// let key = [0x42u8; 32];
/// let sealed = encrypt(&key, b"voucher bytes").unwrap();
/// assert_eq!(decrypt(&key, &sealed).unwrap(), b"voucher bytes");
/// ```
pub fn encrypt(key: &[u8; AES_KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    encrypt_with_aad(key, plaintext, &[])
}

/// Decrypt data previously produced by [`encrypt`].
///
/// Fails with `DecryptFailed` for a wrong key, any bit flip and any
/// truncation past the nonce. We don't distinguish between these cases.
pub fn decrypt(key: &[u8; AES_KEY_LENGTH], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    decrypt_with_aad(key, data, &[])
}

/// Encrypt with Additional Authenticated Data.
///
/// The AAD is authenticated but not encrypted and is not part of the
/// output. The caller must hand the identical AAD to
/// [`decrypt_with_aad`].
pub fn encrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt `nonce || ciphertext` that was sealed with the given AAD.
pub fn decrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    data: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptFailed)
}

/// Generate a random 256-bit key. Used for the profile data key that the
/// password and recovery slots wrap.
pub fn random_key() -> [u8; AES_KEY_LENGTH] {
    let mut key = [0u8; AES_KEY_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = random_key();
        let plaintext = b"eMinuto voucher, 50.00 M";
        let sealed = encrypt(&key, plaintext).unwrap();
        assert_eq!(decrypt(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt(&[1u8; 32], b"secret").unwrap();
        assert!(matches!(
            decrypt(&[2u8; 32], &sealed),
            Err(EncryptionError::DecryptFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [7u8; 32];
        let mut sealed = encrypt(&key, b"do not touch").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(matches!(
            decrypt(&[0u8; 32], &[0u8; 5]),
            Err(EncryptionError::CiphertextTooShort)
        ));
    }

    #[test]
    fn aad_mismatch_fails() {
        let key = [3u8; 32];
        let sealed = encrypt_with_aad(&key, b"payload", b"header-a").unwrap();
        assert!(decrypt_with_aad(&key, &sealed, b"header-b").is_err());
        assert_eq!(
            decrypt_with_aad(&key, &sealed, b"header-a").unwrap(),
            b"payload"
        );
    }

    #[test]
    fn nonces_are_unique() {
        let key = [9u8; 32];
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();
        assert_ne!(a[..AES_NONCE_LENGTH], b[..AES_NONCE_LENGTH]);
    }
}
