//! # Secure Store
//!
//! Encrypted files under the data root:
//!
//! ```text
//! <data_root>/
//! ├── userprofile.dat
//! ├── own/eMinuto-<local_id>.mv
//! ├── other/…   used/…   unfinished/…   archived/…   trashed/…
//! ```
//!
//! Writes are atomic from the caller's point of view: the new file is
//! written to a `.tmp` sibling and renamed into place, and only then is a
//! voucher's previous file removed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::envelope::{is_ciphertext, seal, Envelope, EnvelopeError, EnvelopeMode};
use crate::codec::{canonical_bytes, decode, CodecError};
use crate::config::{
    voucher_file_name, AES_KEY_LENGTH, TEMP_FILE_SUFFIX, VOUCHER_FILE_EXTENSION,
    VOUCHER_FILE_PREFIX,
};
use crate::error::ErrorCategory;
use crate::identity::{Identity, IdentityError};
use crate::voucher::{GuarantorSignatureBundle, Voucher};
use crate::wallet::{UserTransaction, VoucherStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed -- wrong key or corrupted file")]
    DecryptionFailed,

    #[error("ciphertext is not addressed to this profile")]
    UnrecognizedCiphertext,

    #[error("voucher has no local id")]
    MissingLocalId,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("key agreement failed: {0}")]
    KeyAgreement(#[from] IdentityError),
}

impl StoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::Io { .. } => ErrorCategory::Io,
            StoreError::Codec(e) => e.category(),
            StoreError::MissingLocalId => ErrorCategory::State,
            StoreError::EncryptionFailed
            | StoreError::DecryptionFailed
            | StoreError::UnrecognizedCiphertext
            | StoreError::KeyAgreement(_) => ErrorCategory::Cryptographic,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn seal_body(
    mode: &EnvelopeMode,
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
) -> Result<Vec<u8>, StoreError> {
    seal(mode, key, plaintext).map_err(|e| {
        warn!(error = %e, "sealing failed");
        StoreError::EncryptionFailed
    })
}

impl From<EnvelopeError> for StoreError {
    fn from(_: EnvelopeError) -> Self {
        StoreError::DecryptionFailed
    }
}

/// What travels between two parties in an exchange file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ExchangePayload {
    /// A single voucher: an unfinished one on its way to a guarantor, or
    /// any voucher handed over whole.
    Voucher(Voucher),
    /// Guarantor entries on their way back to the creator.
    GuarantorSignatures(GuarantorSignatureBundle),
    /// A multi-voucher payment.
    Payment(UserTransaction),
}

impl ExchangePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangePayload::Voucher(_) => "voucher",
            ExchangePayload::GuarantorSignatures(_) => "guarantor_signatures",
            ExchangePayload::Payment(_) => "payment",
        }
    }
}

/// File access for one data root.
#[derive(Debug, Clone)]
pub struct SecureStore {
    root: PathBuf,
}

impl SecureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_dir(&self, status: VoucherStatus) -> PathBuf {
        self.root.join(status.folder_name())
    }

    /// Where a voucher with `local_id` in `status` lives.
    pub fn voucher_path(&self, status: VoucherStatus, local_id: &str) -> PathBuf {
        self.status_dir(status).join(voucher_file_name(local_id))
    }

    // --- raw files ---------------------------------------------------------

    /// Write `bytes` to `path` via a temporary sibling and a rename.
    pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".");
        tmp.push(TEMP_FILE_SUFFIX);
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes).map_err(io_error(&tmp))?;
        fs::rename(&tmp, path).map_err(io_error(path))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
        fs::read(path).map_err(io_error(path))
    }

    /// Remove a file. A file that is already gone is not an error.
    pub fn delete_file(path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "file deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(path)(e)),
        }
    }

    // --- records under the holder's file key -----------------------------------

    /// Encrypt the canonical serialization of `record` under `key` and
    /// save it as `name`, optionally inside `subfolder` of the data root.
    pub fn encrypt_and_save<T: Serialize>(
        &self,
        record: &T,
        name: &str,
        key: &[u8; AES_KEY_LENGTH],
        subfolder: Option<&str>,
    ) -> Result<PathBuf, StoreError> {
        let dir = match subfolder {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        };
        let path = dir.join(name);
        let plaintext = canonical_bytes(record)?;
        let sealed = seal_body(&EnvelopeMode::FileKey, key, &plaintext)?;
        Self::write_atomic(&path, &sealed)?;
        Ok(path)
    }

    /// Load a record saved by [`encrypt_and_save`](Self::encrypt_and_save).
    /// Plaintext files are accepted as they are.
    pub fn decrypt_and_load<T: DeserializeOwned>(
        &self,
        path: &Path,
        key: &[u8; AES_KEY_LENGTH],
    ) -> Result<T, StoreError> {
        let bytes = Self::read(path)?;
        if !is_ciphertext(&bytes) {
            return Ok(decode(&bytes)?);
        }
        let plaintext = Envelope::parse(&bytes)?.open(key)?;
        Ok(decode(&plaintext)?)
    }

    /// Write `voucher` into the folder for `status` and return the path.
    /// Leaves the voucher's local state and any previous file alone.
    pub fn write_voucher(
        &self,
        voucher: &Voucher,
        status: VoucherStatus,
        key: &[u8; AES_KEY_LENGTH],
    ) -> Result<PathBuf, StoreError> {
        let local_id = voucher
            .local
            .local_id
            .as_deref()
            .ok_or(StoreError::MissingLocalId)?;
        let path = self.encrypt_and_save(
            voucher,
            &voucher_file_name(local_id),
            key,
            Some(status.folder_name()),
        )?;
        debug!(local_id = %local_id, status = %status, "voucher written");
        Ok(path)
    }

    /// Irreversibly remove a voucher's backing file.
    pub fn delete_voucher(&self, voucher: &Voucher) -> Result<(), StoreError> {
        if let Some(path) = &voucher.local.file_path {
            Self::delete_file(path)?;
            info!(voucher_id = %voucher.voucher_id(), "voucher file deleted");
        }
        Ok(())
    }

    /// Every voucher file below the data root, with the folder it sits in.
    pub fn list_voucher_files(&self) -> Result<Vec<(VoucherStatus, PathBuf)>, StoreError> {
        let mut files = Vec::new();
        for status in VoucherStatus::ALL {
            let dir = self.status_dir(status);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&dir)(e)),
            };
            for entry in entries {
                let path = entry.map_err(io_error(&dir))?.path();
                let is_voucher_file = path.is_file()
                    && path.extension().is_some_and(|ext| ext == VOUCHER_FILE_EXTENSION)
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(VOUCHER_FILE_PREFIX));
                if is_voucher_file {
                    files.push((status, path));
                }
            }
        }
        files.sort();
        Ok(files)
    }

    // --- exchange files ----------------------------------------------------

    /// Seal `payload` for `recipient_id` with the key both parties can
    /// derive from their identities.
    pub fn seal_for(
        sender: &Identity,
        recipient_id: &str,
        payload: &ExchangePayload,
    ) -> Result<Vec<u8>, StoreError> {
        let key = sender.shared_key_with(recipient_id)?;
        let mode = EnvelopeMode::Shared {
            sender_id: sender.id().to_string(),
            recipient_id: recipient_id.to_string(),
        };
        let plaintext = canonical_bytes(payload)?;
        seal_body(&mode, &key, &plaintext)
    }

    /// Write an exchange file for `recipient_id`.
    pub fn export(
        path: &Path,
        sender: &Identity,
        recipient_id: &str,
        payload: &ExchangePayload,
    ) -> Result<(), StoreError> {
        let sealed = Self::seal_for(sender, recipient_id, payload)?;
        Self::write_atomic(path, &sealed)?;
        info!(
            path = %path.display(),
            recipient = %recipient_id,
            kind = payload.kind(),
            "exchange file written"
        );
        Ok(())
    }

    /// Decode an exchange file (or any voucher file) for `me`.
    ///
    /// Ciphertext is tried with the key shared with the other named party
    /// first, then with `file_key` for files this profile wrote itself.
    /// If neither opens it the file is `UnrecognizedCiphertext`. Plaintext
    /// may hold an [`ExchangePayload`] or a bare voucher.
    pub fn open_exchange(
        bytes: &[u8],
        me: &Identity,
        file_key: &[u8; AES_KEY_LENGTH],
    ) -> Result<ExchangePayload, StoreError> {
        let plaintext = if is_ciphertext(bytes) {
            let envelope = Envelope::parse(bytes).map_err(|_| StoreError::UnrecognizedCiphertext)?;
            let mut opened = None;
            if let EnvelopeMode::Shared {
                sender_id,
                recipient_id,
            } = &envelope.mode
            {
                let peer = if recipient_id == me.id() {
                    Some(sender_id)
                } else if sender_id == me.id() {
                    Some(recipient_id)
                } else {
                    None
                };
                if let Some(peer) = peer {
                    if let Ok(key) = me.shared_key_with(peer) {
                        opened = envelope.open(&key).ok();
                    }
                }
            }
            match opened.or_else(|| envelope.open(file_key).ok()) {
                Some(plaintext) => plaintext,
                None => {
                    warn!("exchange file could not be opened with any key");
                    return Err(StoreError::UnrecognizedCiphertext);
                }
            }
        } else {
            bytes.to_vec()
        };

        match decode::<ExchangePayload>(&plaintext) {
            Ok(payload) => Ok(payload),
            Err(e) => decode::<Voucher>(&plaintext)
                .map(ExchangePayload::Voucher)
                .map_err(|_| StoreError::Codec(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PersonInfo;
    use crate::voucher::{Amount, VoucherDraft};
    use tempfile::TempDir;

    fn unfinished(creator: &Identity) -> Voucher {
        Voucher::create(
            creator,
            VoucherDraft::new(
                PersonInfo::named("Ada", "Lovelace"),
                Amount::from_whole(10).unwrap(),
                "Berlin",
            ),
        )
        .unwrap()
    }

    #[test]
    fn record_round_trip_and_wrong_key() {
        let dir = TempDir::new().unwrap();
        let store = SecureStore::new(dir.path());
        let (alice, _) = Identity::generate().unwrap();
        let voucher = unfinished(&alice);
        let key = [3u8; 32];

        let path = store
            .encrypt_and_save(&voucher, "v.mv", &key, Some("own"))
            .unwrap();
        assert!(path.starts_with(dir.path().join("own")));
        let loaded: Voucher = store.decrypt_and_load(&path, &key).unwrap();
        assert_eq!(loaded, voucher);

        assert!(matches!(
            store.decrypt_and_load::<Voucher>(&path, &[4u8; 32]),
            Err(StoreError::DecryptionFailed)
        ));
    }

    #[test]
    fn plaintext_voucher_files_load() {
        let dir = TempDir::new().unwrap();
        let store = SecureStore::new(dir.path());
        let (alice, _) = Identity::generate().unwrap();
        let voucher = unfinished(&alice);
        let path = dir.path().join("plain.mv");
        fs::write(&path, serde_json::to_vec(&voucher).unwrap()).unwrap();
        let loaded: Voucher = store.decrypt_and_load(&path, &[0u8; 32]).unwrap();
        assert_eq!(loaded, voucher);
    }

    #[test]
    fn write_voucher_keeps_the_previous_file() {
        let dir = TempDir::new().unwrap();
        let store = SecureStore::new(dir.path());
        let (alice, _) = Identity::generate().unwrap();
        let mut voucher = unfinished(&alice);
        voucher.local.local_id = Some(voucher.compute_local_id(alice.id()));
        let key = [5u8; 32];

        let first = store
            .write_voucher(&voucher, VoucherStatus::Unfinished, &key)
            .unwrap();
        let second = store
            .write_voucher(&voucher, VoucherStatus::Trashed, &key)
            .unwrap();
        assert!(first.exists());
        assert!(second.exists());
        assert_eq!(voucher.local.file_path, None);
        assert_eq!(store.list_voucher_files().unwrap().len(), 2);

        voucher.local.file_path = Some(first.clone());
        store.delete_voucher(&voucher).unwrap();
        assert!(!first.exists());
        assert_eq!(
            store.list_voucher_files().unwrap(),
            vec![(VoucherStatus::Trashed, second)]
        );
    }

    #[test]
    fn write_voucher_needs_a_local_id() {
        let dir = TempDir::new().unwrap();
        let store = SecureStore::new(dir.path());
        let (alice, _) = Identity::generate().unwrap();
        assert!(matches!(
            store.write_voucher(&unfinished(&alice), VoucherStatus::Unfinished, &[5u8; 32]),
            Err(StoreError::MissingLocalId)
        ));
    }

    #[test]
    fn shared_exchange_opens_for_both_parties_only() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let (eve, _) = Identity::generate().unwrap();
        let payload = ExchangePayload::Voucher(unfinished(&alice));

        let sealed = SecureStore::seal_for(&alice, bob.id(), &payload).unwrap();
        let unrelated_key = [1u8; 32];
        assert_eq!(
            SecureStore::open_exchange(&sealed, &bob, &unrelated_key).unwrap(),
            payload
        );
        assert_eq!(
            SecureStore::open_exchange(&sealed, &alice, &unrelated_key).unwrap(),
            payload
        );
        assert!(matches!(
            SecureStore::open_exchange(&sealed, &eve, &unrelated_key),
            Err(StoreError::UnrecognizedCiphertext)
        ));
    }

    #[test]
    fn own_file_key_is_the_fallback() {
        let (alice, _) = Identity::generate().unwrap();
        let key = [6u8; 32];
        let payload = ExchangePayload::Voucher(unfinished(&alice));
        let sealed = seal(
            &EnvelopeMode::FileKey,
            &key,
            &canonical_bytes(&payload).unwrap(),
        )
        .unwrap();
        assert_eq!(
            SecureStore::open_exchange(&sealed, &alice, &key).unwrap(),
            payload
        );
    }

    #[test]
    fn sealing_failure_is_an_encryption_error() {
        let mode = EnvelopeMode::Shared {
            sender_id: "m".repeat(usize::from(u16::MAX) + 1),
            recipient_id: "minuto1peer".into(),
        };
        let err = seal_body(&mode, &[7u8; 32], b"{}").unwrap_err();
        assert!(matches!(err, StoreError::EncryptionFailed));
        assert_eq!(err.category(), ErrorCategory::Cryptographic);
    }

    #[test]
    fn plaintext_bare_voucher_is_a_voucher_payload() {
        let (alice, _) = Identity::generate().unwrap();
        let voucher = unfinished(&alice);
        let bytes = serde_json::to_vec(&voucher).unwrap();
        assert_eq!(
            SecureStore::open_exchange(&bytes, &alice, &[0u8; 32]).unwrap(),
            ExchangePayload::Voucher(voucher)
        );
    }
}
