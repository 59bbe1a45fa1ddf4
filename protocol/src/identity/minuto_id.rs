//! # Minuto IDs
//!
//! A Minuto ID is the string every voucher record uses to name a party:
//!
//! ```text
//! public_key (32 bytes) -> Bech32("minuto", public_key) -> minuto1qw508d6q...
//! ```
//!
//! Unlike a hashed address, the ID carries the full Ed25519 public key.
//! Vouchers are verified offline by whoever happens to hold them, with no
//! directory to look keys up in, so the ID itself has to be enough to check
//! a signature. Bech32's checksum catches typos when IDs are pasted around.

use bech32::{Bech32, Hrp};
use thiserror::Error;

use crate::config::ID_HRP;
use crate::crypto::keys::{KeyError, MinutoPublicKey};

/// Errors that can occur while encoding or parsing a Minuto ID.
#[derive(Debug, Error)]
pub enum MinutoIdError {
    #[error("bech32 error: {0}")]
    Bech32(String),

    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid id payload: {0}")]
    InvalidKey(#[from] KeyError),
}

fn id_hrp() -> Result<Hrp, MinutoIdError> {
    Hrp::parse(ID_HRP).map_err(|e| MinutoIdError::Bech32(e.to_string()))
}

/// Encode a public key as its Minuto ID.
pub fn encode_id(pk: &MinutoPublicKey) -> Result<String, MinutoIdError> {
    bech32::encode::<Bech32>(id_hrp()?, pk.as_bytes())
        .map_err(|e| MinutoIdError::Bech32(e.to_string()))
}

/// Recover the public key embedded in a Minuto ID.
///
/// Validates checksum, prefix, payload length and that the payload is a
/// valid Ed25519 point.
pub fn decode_id(id: &str) -> Result<MinutoPublicKey, MinutoIdError> {
    let (hrp, data) = bech32::decode(id).map_err(|e| MinutoIdError::Bech32(e.to_string()))?;
    if hrp != id_hrp()? {
        return Err(MinutoIdError::InvalidHrp {
            expected: ID_HRP.to_string(),
            got: hrp.to_string(),
        });
    }
    Ok(MinutoPublicKey::try_from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::MinutoKeypair;

    #[test]
    fn id_roundtrips_to_public_key() {
        let kp = MinutoKeypair::generate();
        let id = encode_id(&kp.public_key()).unwrap();
        assert!(id.starts_with("minuto1"));
        assert_eq!(decode_id(&id).unwrap(), kp.public_key());
    }

    #[test]
    fn typo_is_caught_by_checksum() {
        let kp = MinutoKeypair::generate();
        let mut id = encode_id(&kp.public_key()).unwrap();
        let last = id.pop().unwrap();
        id.push(if last == 'q' { 'p' } else { 'q' });
        assert!(decode_id(&id).is_err());
    }

    #[test]
    fn foreign_prefix_rejected() {
        let kp = MinutoKeypair::generate();
        let hrp = Hrp::parse("bc").unwrap();
        let foreign = bech32::encode::<Bech32>(hrp, kp.public_key().as_bytes()).unwrap();
        assert!(matches!(
            decode_id(&foreign),
            Err(MinutoIdError::InvalidHrp { .. })
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(decode_id("").is_err());
        assert!(decode_id("minuto1notreallyanid").is_err());
    }
}
