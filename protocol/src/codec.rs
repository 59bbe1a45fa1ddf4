//! # Canonical Encoding
//!
//! One encoder for everything that gets signed or persisted. Records are
//! serialized through `serde_json::Value`, whose object map is a `BTreeMap`,
//! so keys come out sorted regardless of struct field order. Two
//! implementations that agree on the field names agree on the bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Encoding or decoding a record failed.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode record: {0}")]
    Encode(String),

    #[error("failed to decode record: {0}")]
    Decode(String),
}

impl CodecError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CodecError::Encode(_) => ErrorCategory::State,
            // Undecodable bytes are indistinguishable from tampering.
            CodecError::Decode(_) => ErrorCategory::Cryptographic,
        }
    }
}

/// Deterministic, compact JSON with lexicographically sorted keys.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Inverse of [`canonical_bytes`]. Accepts any JSON layout, not only the
/// canonical one, so hand-edited plaintext files still load.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Unsorted {
        zeta: u32,
        alpha: String,
        mid: Option<bool>,
    }

    #[test]
    fn keys_are_sorted() {
        let bytes = canonical_bytes(&Unsorted {
            zeta: 1,
            alpha: "a".into(),
            mid: None,
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"alpha":"a","mid":null,"zeta":1}"#
        );
    }

    #[test]
    fn encoding_is_stable_across_calls() {
        let v = Unsorted {
            zeta: 9,
            alpha: "x".into(),
            mid: Some(true),
        };
        assert_eq!(canonical_bytes(&v).unwrap(), canonical_bytes(&v).unwrap());
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode::<Unsorted>(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
        assert_eq!(err.category(), ErrorCategory::Cryptographic);
    }
}
