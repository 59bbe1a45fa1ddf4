//! # Shared Exchange Keys
//!
//! Voucher files travel between two parties out of band (mail, USB stick,
//! messenger). They are encrypted under a key both ends can compute from
//! their long-term identity keys and nobody else can:
//!
//! 1. Each side converts its Ed25519 identity to X25519 (scalar bytes for
//!    the secret, Montgomery form for the peer's public key).
//! 2. Static-static Diffie-Hellman yields the raw shared point.
//! 3. The raw point is never used as a key. It goes through BLAKE3
//!    `derive_key` together with both Ed25519 public keys in sorted order,
//!    so Alice and Bob derive the same 256-bit key.
//!
//! There is no forward secrecy here: the exchange must work with the
//! recipient offline, and the recipient must be able to reopen the file later.

use thiserror::Error;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use crate::config::{AES_KEY_LENGTH, SHARED_KEY_CONTEXT};
use crate::crypto::keys::{KeyError, MinutoKeypair, MinutoPublicKey};

#[derive(Debug, Error)]
pub enum SharedKeyError {
    #[error("peer public key is not a valid Ed25519 point")]
    InvalidPeerKey(#[from] KeyError),

    #[error("key agreement produced a non-contributory shared secret")]
    NonContributory,
}

/// Derive the symmetric key shared between `ours` and `peer`.
pub fn shared_key(
    ours: &MinutoKeypair,
    peer: &MinutoPublicKey,
) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, SharedKeyError> {
    let secret = StaticSecret::from(ours.x25519_scalar_bytes());
    let peer_x25519 = X25519Public::from(peer.to_x25519_bytes()?);
    let shared = secret.diffie_hellman(&peer_x25519);
    if !shared.was_contributory() {
        return Err(SharedKeyError::NonContributory);
    }

    let our_public = ours.public_key();
    let (first, second) = if our_public.as_bytes() <= peer.as_bytes() {
        (our_public.as_bytes(), peer.as_bytes())
    } else {
        (peer.as_bytes(), our_public.as_bytes())
    };

    let mut hasher = blake3::Hasher::new_derive_key(SHARED_KEY_CONTEXT);
    hasher.update(shared.as_bytes());
    hasher.update(first);
    hasher.update(second);
    Ok(Zeroizing::new(*hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_derive_the_same_key() {
        let alice = MinutoKeypair::generate();
        let bob = MinutoKeypair::generate();
        let k_ab = shared_key(&alice, &bob.public_key()).unwrap();
        let k_ba = shared_key(&bob, &alice.public_key()).unwrap();
        assert_eq!(*k_ab, *k_ba);
    }

    #[test]
    fn third_party_derives_a_different_key() {
        let alice = MinutoKeypair::generate();
        let bob = MinutoKeypair::generate();
        let eve = MinutoKeypair::generate();
        let k_ab = shared_key(&alice, &bob.public_key()).unwrap();
        let k_eb = shared_key(&eve, &bob.public_key()).unwrap();
        assert_ne!(*k_ab, *k_eb);
    }

    #[test]
    fn key_is_deterministic() {
        let alice = MinutoKeypair::from_seed(&[1u8; 32]);
        let bob = MinutoKeypair::from_seed(&[2u8; 32]);
        assert_eq!(
            *shared_key(&alice, &bob.public_key()).unwrap(),
            *shared_key(&alice, &bob.public_key()).unwrap()
        );
    }
}
