//! # Ciphertext Envelope
//!
//! Framing for every encrypted file:
//!
//! ```text
//! ┌──────────────┬─────────┬──────┬──────────────────────────────┬──────────────────────┐
//! │ MINUTO\0E    │ version │ mode │ shared mode only:            │ nonce ‖ ciphertext   │
//! │ (8 bytes)    │ (1)     │ (1)  │ u16 LE len ‖ sender id       │ (AES-256-GCM)        │
//! │              │         │      │ u16 LE len ‖ recipient id    │                      │
//! └──────────────┴─────────┴──────┴──────────────────────────────┴──────────────────────┘
//! ```
//!
//! Everything before the nonce is the header. It is passed to AES-GCM as
//! associated data, so the parties named in it cannot be swapped.
//! Plaintext JSON never starts with the marker, which is how readers tell
//! the two formats apart.

use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, CIPHERTEXT_MARKER, ENVELOPE_VERSION};
use crate::crypto::encryption::{decrypt_with_aad, encrypt_with_aad, EncryptionError};

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

/// Which key sealed the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeMode {
    /// The holder's own seed-derived file key.
    FileKey,
    /// The key agreed between the two named parties.
    Shared {
        sender_id: String,
        recipient_id: String,
    },
}

impl EnvelopeMode {
    fn tag(&self) -> u8 {
        match self {
            EnvelopeMode::FileKey => 0x01,
            EnvelopeMode::Shared { .. } => 0x02,
        }
    }
}

/// Whether `bytes` start like an envelope.
pub fn is_ciphertext(bytes: &[u8]) -> bool {
    bytes.starts_with(CIPHERTEXT_MARKER)
}

fn push_field(buf: &mut Vec<u8>, field: &str) -> Result<(), EnvelopeError> {
    let len = u16::try_from(field.len()).map_err(|_| EnvelopeError::Malformed("header field too long"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(field.as_bytes());
    Ok(())
}

fn encode_header(mode: &EnvelopeMode) -> Result<Vec<u8>, EnvelopeError> {
    let mut header = Vec::with_capacity(CIPHERTEXT_MARKER.len() + 2 + 128);
    header.extend_from_slice(CIPHERTEXT_MARKER);
    header.push(ENVELOPE_VERSION);
    header.push(mode.tag());
    if let EnvelopeMode::Shared {
        sender_id,
        recipient_id,
    } = mode
    {
        push_field(&mut header, sender_id)?;
        push_field(&mut header, recipient_id)?;
    }
    Ok(header)
}

/// Encrypt `plaintext` under `key` and frame it.
pub fn seal(
    mode: &EnvelopeMode,
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
) -> Result<Vec<u8>, EnvelopeError> {
    let mut out = encode_header(mode)?;
    let body = encrypt_with_aad(key, plaintext, &out)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// A parsed, still encrypted envelope borrowing the file's bytes.
#[derive(Debug)]
pub struct Envelope<'a> {
    pub mode: EnvelopeMode,
    header: &'a [u8],
    body: &'a [u8],
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], EnvelopeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(EnvelopeError::Malformed("truncated header"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, EnvelopeError> {
        Ok(self.take(1)?[0])
    }

    fn field(&mut self) -> Result<String, EnvelopeError> {
        let len_bytes = self.take(2)?;
        let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| EnvelopeError::Malformed("header field is not UTF-8"))
    }
}

impl<'a> Envelope<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, EnvelopeError> {
        if !is_ciphertext(bytes) {
            return Err(EnvelopeError::Malformed("missing ciphertext marker"));
        }
        let mut reader = Reader {
            bytes,
            pos: CIPHERTEXT_MARKER.len(),
        };
        let version = reader.byte()?;
        if version != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(version));
        }
        let mode = match reader.byte()? {
            0x01 => EnvelopeMode::FileKey,
            0x02 => EnvelopeMode::Shared {
                sender_id: reader.field()?,
                recipient_id: reader.field()?,
            },
            _ => return Err(EnvelopeError::Malformed("unknown mode")),
        };
        let (header, body) = bytes.split_at(reader.pos);
        Ok(Self { mode, header, body })
    }

    /// Decrypt the body. Wrong key and tampered header fail alike.
    pub fn open(&self, key: &[u8; AES_KEY_LENGTH]) -> Result<Vec<u8>, EnvelopeError> {
        Ok(decrypt_with_aad(key, self.body, self.header)?)
    }
}
