//! # Profile & Session
//!
//! The profile file holds the holder's contact card and recovery seed,
//! encrypted under a random data key. That data key is stored twice, in
//! two slots:
//!
//! ```text
//! password slot : AES-GCM(Argon2id(password, salt), data_key)
//! recovery slot : AES-GCM(BLAKE3-KDF(seed),         data_key)
//! ciphertext    : AES-GCM(data_key, canonical(ProfileRecord))
//! ```
//!
//! so a forgotten password is recovered with the seed, and a password
//! change rewrites one slot instead of the whole profile. Voucher files use
//! a third key derived from the seed alone and never depend on the password.
//!
//! A [`Session`] is an unlocked profile: identity, keys and the voucher
//! collection. It is created explicitly by the shell and passed around;
//! there is no global "current profile".

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use super::secure_store::{ExchangePayload, SecureStore, StoreError};
use crate::codec::{canonical_bytes, decode, CodecError};
use crate::config::{StoreConfig, AES_KEY_LENGTH, PROFILE_FORMAT, PROFILE_VERSION};
use crate::crypto::encryption::{decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, random_key, EncryptionError};
use crate::crypto::kdf::{
    file_key_from_seed, password_key, random_salt, recovery_key_from_seed, KdfError, KdfParams,
};
use crate::crypto::mnemonic::{normalize_seed, validate_seed};
use crate::error::ErrorCategory;
use crate::identity::{Identity, IdentityError, PersonInfo};
use crate::voucher::{
    merge_guarantor_signatures, now_millis, sign_as_creator, sign_as_guarantor, verify_voucher,
    Amount, GuarantorSignatureBundle, LocalState, Voucher, VoucherDraft, VoucherError,
};
use crate::wallet::{
    find_conflicts, payment, DoubleSpendEvidence, PaymentError, TrashOutcome, UserTransaction,
    VoucherCollection, VoucherStatus,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProfileError {
    /// Missing file, unreadable file and failed decryption all end up here.
    #[error("wrong password")]
    WrongPassword,

    #[error("a profile already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("invalid recovery seed")]
    InvalidSeed,

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("no voucher {0} in this profile")]
    VoucherNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Kdf(#[from] KdfError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Voucher(#[from] VoucherError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl ProfileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProfileError::WrongPassword | ProfileError::Encryption(_) => {
                ErrorCategory::Cryptographic
            }
            ProfileError::AlreadyExists(_)
            | ProfileError::InvalidSeed
            | ProfileError::EmptyPassword
            | ProfileError::VoucherNotFound(_) => ErrorCategory::State,
            ProfileError::Store(e) => e.category(),
            ProfileError::Identity(e) => e.category(),
            ProfileError::Kdf(_) => ErrorCategory::State,
            ProfileError::Codec(e) => e.category(),
            ProfileError::Voucher(e) => e.category(),
            ProfileError::Payment(e) => e.category(),
        }
    }
}

// ---------------------------------------------------------------------------
// On-disk records
// ---------------------------------------------------------------------------

/// The encrypted part of the profile.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub person: PersonInfo,
    /// Normalized BIP-39 phrase.
    seed: String,
    /// Unix milliseconds.
    pub created_at: u64,
}

impl fmt::Debug for ProfileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileRecord")
            .field("person", &self.person)
            .field("seed", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Drop for ProfileRecord {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

/// The profile file as stored. Binary fields are hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileFile {
    format: String,
    version: u32,
    kdf: KdfParams,
    password_salt: String,
    password_slot: String,
    recovery_slot: String,
    ciphertext: String,
}

impl ProfileFile {
    fn read(path: &Path) -> Result<Self, ProfileError> {
        let bytes = SecureStore::read(path).map_err(|_| ProfileError::WrongPassword)?;
        let file: ProfileFile = decode(&bytes).map_err(|_| ProfileError::WrongPassword)?;
        if file.format != PROFILE_FORMAT || file.version != PROFILE_VERSION {
            return Err(ProfileError::WrongPassword);
        }
        Ok(file)
    }

    fn unwrap_slot(
        slot_hex: &str,
        key: &[u8; AES_KEY_LENGTH],
    ) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, ProfileError> {
        let slot = hex::decode(slot_hex).map_err(|_| ProfileError::WrongPassword)?;
        let plain = Zeroizing::new(decrypt(key, &slot).map_err(|_| ProfileError::WrongPassword)?);
        let data_key: [u8; AES_KEY_LENGTH] = plain
            .as_slice()
            .try_into()
            .map_err(|_| ProfileError::WrongPassword)?;
        Ok(Zeroizing::new(data_key))
    }

    fn password_data_key(&self, password: &str) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, ProfileError> {
        let salt = hex::decode(&self.password_salt).map_err(|_| ProfileError::WrongPassword)?;
        let key = password_key(password, &salt, &self.kdf).map_err(|_| ProfileError::WrongPassword)?;
        Self::unwrap_slot(&self.password_slot, &key)
    }

    fn recovery_data_key(&self, seed: &str) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, ProfileError> {
        let key = recovery_key_from_seed(seed).map_err(|_| ProfileError::WrongPassword)?;
        Self::unwrap_slot(&self.recovery_slot, &key)
    }

    fn record(&self, data_key: &[u8; AES_KEY_LENGTH]) -> Result<ProfileRecord, ProfileError> {
        let sealed = hex::decode(&self.ciphertext).map_err(|_| ProfileError::WrongPassword)?;
        let plain = Zeroizing::new(
            decrypt_with_aad(data_key, &sealed, PROFILE_FORMAT.as_bytes())
                .map_err(|_| ProfileError::WrongPassword)?,
        );
        decode(&plain).map_err(|_| ProfileError::WrongPassword)
    }

    /// Rewrap `data_key` under a new password and salt.
    fn set_password(
        &mut self,
        password: &str,
        kdf: KdfParams,
        data_key: &[u8; AES_KEY_LENGTH],
    ) -> Result<(), ProfileError> {
        if password.is_empty() {
            return Err(ProfileError::EmptyPassword);
        }
        let salt = random_salt();
        let key = password_key(password, &salt, &kdf)?;
        self.kdf = kdf;
        self.password_salt = hex::encode(salt);
        self.password_slot = hex::encode(encrypt(&key, data_key)?);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What [`Session::open_file`] did with a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A voucher was filed, or `None` if the same version was already held.
    Voucher { status: Option<VoucherStatus> },
    /// Guarantor entries were merged into the matching unfinished voucher.
    GuarantorSignatures { voucher_id: String, added: usize },
    /// A payment was received.
    Payment { amount: Amount, filed: Vec<VoucherStatus> },
}

/// What [`Session::trash`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashResult {
    Trashed,
    Deleted,
}

/// An unlocked profile.
pub struct Session {
    config: StoreConfig,
    store: SecureStore,
    file: ProfileFile,
    record: ProfileRecord,
    identity: Identity,
    data_key: Zeroizing<[u8; AES_KEY_LENGTH]>,
    file_key: Zeroizing<[u8; AES_KEY_LENGTH]>,
    collection: VoucherCollection,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("data_root", &self.config.data_root)
            .field("identity", &self.identity)
            .field("vouchers", &self.collection.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn profile_exists(config: &StoreConfig) -> bool {
        config.profile_path().is_file()
    }

    /// Create and save a new profile for `seed`.
    ///
    /// Voucher files already present under the data root (restored from a
    /// backup, say) are picked up if the seed's file key opens them.
    pub fn create_profile(
        config: StoreConfig,
        seed: &str,
        person: PersonInfo,
        password: &str,
    ) -> Result<Self, ProfileError> {
        let path = config.profile_path();
        if path.exists() {
            return Err(ProfileError::AlreadyExists(path));
        }
        if !validate_seed(seed) {
            return Err(ProfileError::InvalidSeed);
        }
        if password.is_empty() {
            return Err(ProfileError::EmptyPassword);
        }

        let seed = normalize_seed(seed);
        let data_key = Zeroizing::new(random_key());
        let recovery_key = recovery_key_from_seed(&seed)?;
        let mut file = ProfileFile {
            format: PROFILE_FORMAT.to_string(),
            version: PROFILE_VERSION,
            kdf: config.kdf,
            password_salt: String::new(),
            password_slot: String::new(),
            recovery_slot: hex::encode(encrypt(&recovery_key, &data_key[..])?),
            ciphertext: String::new(),
        };
        file.set_password(password, config.kdf, &data_key)?;

        let record = ProfileRecord {
            person,
            seed,
            created_at: now_millis(),
        };
        let mut session = Self::open(config, file, record, data_key)?;
        session.write_profile()?;
        info!(id = %session.identity.id(), "profile created");
        Ok(session)
    }

    /// Unlock with the profile password.
    ///
    /// # Errors
    ///
    /// `WrongPassword` for a bad password and equally for a missing or
    /// damaged profile file.
    pub fn unlock(config: StoreConfig, password: &str) -> Result<Self, ProfileError> {
        let file = ProfileFile::read(&config.profile_path())?;
        let data_key = file.password_data_key(password)?;
        let record = file.record(&data_key)?;
        let session = Self::open(config, file, record, data_key)?;
        info!(id = %session.identity.id(), "profile unlocked");
        Ok(session)
    }

    /// Unlock with the recovery seed in place of the password.
    pub fn unlock_with_seed(config: StoreConfig, seed: &str) -> Result<Self, ProfileError> {
        let file = ProfileFile::read(&config.profile_path())?;
        let data_key = file.recovery_data_key(seed)?;
        let record = file.record(&data_key)?;
        let session = Self::open(config, file, record, data_key)?;
        info!(id = %session.identity.id(), "profile unlocked with recovery seed");
        Ok(session)
    }

    /// Unlock with the seed and set a new password.
    pub fn recover_password_with_seed(
        config: StoreConfig,
        seed: &str,
        new_password: &str,
    ) -> Result<Self, ProfileError> {
        let mut session = Self::unlock_with_seed(config, seed)?;
        let kdf = session.config.kdf;
        session.file.set_password(new_password, kdf, &session.data_key)?;
        session.write_profile()?;
        info!("profile password reset");
        Ok(session)
    }

    /// Replace the password. Voucher files are not touched.
    pub fn change_password(&mut self, old: &str, new: &str) -> Result<(), ProfileError> {
        let current = self.file.password_data_key(old)?;
        if *current != *self.data_key {
            return Err(ProfileError::WrongPassword);
        }
        let kdf = self.config.kdf;
        self.file.set_password(new, kdf, &self.data_key)?;
        self.write_profile()?;
        info!("profile password changed");
        Ok(())
    }

    fn open(
        config: StoreConfig,
        file: ProfileFile,
        record: ProfileRecord,
        data_key: Zeroizing<[u8; AES_KEY_LENGTH]>,
    ) -> Result<Self, ProfileError> {
        let identity = Identity::derive(&record.seed)?;
        let file_key = file_key_from_seed(&record.seed)?;
        let mut session = Self {
            store: SecureStore::new(config.data_root.clone()),
            collection: VoucherCollection::new(identity.id()),
            config,
            file,
            record,
            identity,
            data_key,
            file_key,
        };
        session.reload()?;
        Ok(session)
    }

    // --- accessors ---------------------------------------------------------

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn person(&self) -> &PersonInfo {
        &self.record.person
    }

    /// Replace the contact card used for future vouchers and guarantees.
    pub fn set_person(&mut self, person: PersonInfo) -> Result<(), ProfileError> {
        self.record.person = person;
        self.write_profile()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn collection(&self) -> &VoucherCollection {
        &self.collection
    }

    pub fn list(&self, status: VoucherStatus) -> &[Voucher] {
        self.collection.partition(status)
    }

    /// What the holder can spend from one partition.
    pub fn balance(&self, status: VoucherStatus) -> Amount {
        self.collection.total_available(status)
    }

    // --- persistence -------------------------------------------------------

    fn write_profile(&mut self) -> Result<(), ProfileError> {
        let plain = Zeroizing::new(canonical_bytes(&self.record)?);
        let sealed = encrypt_with_aad(&self.data_key, &plain, PROFILE_FORMAT.as_bytes())?;
        self.file.ciphertext = hex::encode(sealed);
        let bytes = serde_json::to_vec_pretty(&self.file)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        SecureStore::write_atomic(&self.config.profile_path(), &bytes)?;
        debug!("profile written");
        Ok(())
    }

    /// Write every voucher whose file is missing or in the wrong place.
    ///
    /// All new files are written before any voucher points at them. If a
    /// write fails, the files written so far are removed and the collection
    /// is left as it was. Previous files stay; see `remove_stale_files`.
    fn write_changed_vouchers(&mut self) -> Result<usize, ProfileError> {
        let mut written: Vec<PathBuf> = Vec::new();
        let mut failure = None;
        for (status, voucher) in self.collection.iter() {
            let Some(local_id) = voucher.local.local_id.as_deref() else {
                continue;
            };
            let target = self.store.voucher_path(status, local_id);
            if voucher.local.file_path.as_deref() == Some(target.as_path()) {
                continue;
            }
            match self.store.write_voucher(voucher, status, &self.file_key) {
                Ok(path) => written.push(path),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            for path in &written {
                if let Err(cleanup) = SecureStore::delete_file(path) {
                    warn!(path = %path.display(), error = %cleanup, "partial write left behind");
                }
            }
            warn!(error = %e, discarded = written.len(), "voucher files not written");
            return Err(e.into());
        }

        for (status, voucher) in self.collection.iter_mut() {
            if let Some(local_id) = voucher.local.local_id.as_deref() {
                voucher.local.file_path = Some(self.store.voucher_path(status, local_id));
            }
        }
        Ok(written.len())
    }

    /// Delete the files of `before` that no voucher points at any more.
    /// The new state is already on disk, so a failure only leaves a stray
    /// file behind.
    fn remove_stale_files(&self, before: &VoucherCollection) {
        let live: HashSet<&Path> = self
            .collection
            .iter()
            .filter_map(|(_, v)| v.local.file_path.as_deref())
            .collect();
        for (_, voucher) in before.iter() {
            let Some(path) = voucher.local.file_path.as_deref() else {
                continue;
            };
            if live.contains(path) {
                continue;
            }
            if let Err(e) = SecureStore::delete_file(path) {
                warn!(path = %path.display(), error = %e, "stale voucher file left behind");
            }
        }
    }

    fn persist_vouchers(&mut self) -> Result<usize, ProfileError> {
        let before = self.collection.clone();
        let written = self.write_changed_vouchers()?;
        self.remove_stale_files(&before);
        Ok(written)
    }

    /// Run `op` on the collection and persist what it changed, or change
    /// nothing at all. On error the collection is put back and no new file
    /// is left on disk.
    fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut VoucherCollection, &Identity, &PersonInfo) -> Result<T, ProfileError>,
    ) -> Result<T, ProfileError> {
        let before = self.collection.clone();
        let result = op(&mut self.collection, &self.identity, &self.record.person)
            .and_then(|value| self.write_changed_vouchers().map(|_| value));
        match result {
            Ok(value) => {
                self.remove_stale_files(&before);
                Ok(value)
            }
            Err(e) => {
                self.collection = before;
                Err(e)
            }
        }
    }

    /// Persist the profile record and every changed voucher.
    pub fn save(&mut self) -> Result<(), ProfileError> {
        self.write_profile()?;
        let written = self.persist_vouchers()?;
        debug!(written, "session saved");
        Ok(())
    }

    /// Save and close.
    pub fn logout(mut self) -> Result<(), ProfileError> {
        self.save()?;
        info!(id = %self.identity.id(), "logged out");
        Ok(())
    }

    /// Rebuild the collection from the voucher files on disk.
    ///
    /// Trash and archive marks come from the folder a file sits in; every
    /// other file is refiled (and moved on disk) by content. Duplicate
    /// copies are deleted, and a copy in `trashed/` or `archived/` is the
    /// one kept. Unreadable files are skipped. Returns the number of files
    /// written or moved.
    pub fn reload(&mut self) -> Result<usize, ProfileError> {
        let mut files = self.store.list_voucher_files()?;
        files.sort_by_key(|(folder, _)| {
            !matches!(folder, VoucherStatus::Trashed | VoucherStatus::Archived)
        });

        let mut collection = VoucherCollection::new(self.identity.id());
        for (folder, path) in files {
            let mut voucher: Voucher = match self.store.decrypt_and_load(&path, &self.file_key) {
                Ok(voucher) => voucher,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable voucher file");
                    continue;
                }
            };
            voucher.local = LocalState {
                file_path: Some(path.clone()),
                local_id: None,
                trashed: folder == VoucherStatus::Trashed,
                archived: folder == VoucherStatus::Archived,
            };
            if collection.insert(voucher).is_none() {
                debug!(path = %path.display(), "duplicate voucher file removed");
                SecureStore::delete_file(&path)?;
            }
        }
        self.collection = collection;
        let moved = self.persist_vouchers()?;
        info!(vouchers = self.collection.len(), moved, "vouchers loaded");
        Ok(moved)
    }

    // --- voucher operations ------------------------------------------------

    /// Take a voucher out, run `op` on it and file it back under its new
    /// local id. On error nothing changes.
    fn modify<T, E>(
        &mut self,
        local_id: &str,
        op: impl FnOnce(&mut Voucher, &Identity, &PersonInfo) -> Result<T, E>,
    ) -> Result<(T, String), ProfileError>
    where
        ProfileError: From<E>,
    {
        self.commit(|collection, identity, person| {
            let (_, mut voucher) = collection
                .take(local_id)
                .ok_or_else(|| ProfileError::VoucherNotFound(local_id.to_string()))?;
            let value = op(&mut voucher, identity, person)?;
            let new_local_id = voucher.compute_local_id(identity.id());
            // A version already held wins; the taken copy's file goes stale.
            collection.insert(voucher);
            Ok((value, new_local_id))
        })
    }

    /// Start a new voucher. Returns its local id.
    pub fn create_voucher(&mut self, draft: VoucherDraft) -> Result<String, ProfileError> {
        let local_id = self.commit(|collection, identity, _| {
            let voucher = Voucher::create(identity, draft)?;
            let local_id = voucher.compute_local_id(identity.id());
            collection.insert(voucher);
            Ok(local_id)
        })?;
        info!(local_id = %local_id, "voucher created");
        Ok(local_id)
    }

    /// Guarantee an unfinished voucher held by this profile with the
    /// profile's contact card. Returns the entry for the creator.
    pub fn sign_as_guarantor(
        &mut self,
        local_id: &str,
    ) -> Result<GuarantorSignatureBundle, ProfileError> {
        let (entry, _) = self.modify(local_id, |voucher, identity, person| {
            verify_voucher(voucher)?;
            let entry = sign_as_guarantor(voucher, identity, person)?;
            Ok::<_, VoucherError>((voucher.voucher_id().to_string(), entry))
        })?;
        let (voucher_id, entry) = entry;
        Ok(GuarantorSignatureBundle {
            voucher_id,
            entries: vec![entry],
        })
    }

    /// Finalize one of this profile's vouchers. Returns the new local id.
    pub fn sign_as_creator(&mut self, local_id: &str) -> Result<String, ProfileError> {
        let ((), new_local_id) = self.modify(local_id, |voucher, identity, _| {
            sign_as_creator(voucher, identity)
        })?;
        info!(local_id = %new_local_id, "voucher finalized");
        Ok(new_local_id)
    }

    /// Merge returned guarantor entries into the matching unfinished voucher.
    pub fn import_guarantor_signatures(
        &mut self,
        bundle: &GuarantorSignatureBundle,
    ) -> Result<usize, ProfileError> {
        let local_id = self
            .collection
            .find_by_voucher_id(VoucherStatus::Unfinished, &bundle.voucher_id)
            .ok_or_else(|| ProfileError::VoucherNotFound(bundle.voucher_id.clone()))?;
        let (added, _) = self.modify(&local_id, |voucher, _, _| {
            merge_guarantor_signatures(voucher, bundle)
        })?;
        Ok(added)
    }

    /// Pay `amount` to `recipient_id`. The bundle is returned only once
    /// the sender's side is on disk; if that fails nothing is spent.
    pub fn send(
        &mut self,
        recipient_id: &str,
        amount: Amount,
    ) -> Result<UserTransaction, ProfileError> {
        self.commit(|collection, identity, _| {
            Ok(payment::send(collection, identity, recipient_id, amount)?)
        })
    }

    /// Accept an incoming payment.
    pub fn receive(&mut self, bundle: UserTransaction) -> Result<Vec<VoucherStatus>, ProfileError> {
        self.commit(|collection, _, _| Ok(payment::receive(collection, bundle)?))
    }

    // --- exchange files ----------------------------------------------------

    /// Write `payload` to `path`, encrypted for `recipient_id`.
    pub fn export(
        &self,
        payload: &ExchangePayload,
        recipient_id: &str,
        path: &Path,
    ) -> Result<(), ProfileError> {
        SecureStore::export(path, &self.identity, recipient_id, payload)?;
        Ok(())
    }

    /// Export a held voucher for `recipient_id`, e.g. an unfinished one
    /// going to a guarantor.
    pub fn export_voucher(
        &self,
        local_id: &str,
        recipient_id: &str,
        path: &Path,
    ) -> Result<(), ProfileError> {
        let (_, voucher) = self
            .collection
            .find(local_id)
            .ok_or_else(|| ProfileError::VoucherNotFound(local_id.to_string()))?;
        let mut copy = voucher.clone();
        copy.local = LocalState::default();
        self.export(&ExchangePayload::Voucher(copy), recipient_id, path)
    }

    /// Decode a file without acting on it.
    pub fn read_file(&self, path: &Path) -> Result<ExchangePayload, ProfileError> {
        let bytes = SecureStore::read(path)?;
        Ok(SecureStore::open_exchange(&bytes, &self.identity, &self.file_key)?)
    }

    /// Decode a file and act on whatever it carries.
    pub fn open_file(&mut self, path: &Path) -> Result<ImportOutcome, ProfileError> {
        let payload = self.read_file(path)?;
        debug!(kind = payload.kind(), path = %path.display(), "exchange file opened");
        match payload {
            ExchangePayload::Voucher(mut voucher) => {
                if let Err(e) = verify_voucher(&voucher) {
                    warn!(voucher_id = %voucher.voucher_id(), "rejected imported voucher");
                    return Err(e.into());
                }
                voucher.local = LocalState::default();
                let status = self.commit(|collection, _, _| Ok(collection.insert(voucher)))?;
                Ok(ImportOutcome::Voucher { status })
            }
            ExchangePayload::GuarantorSignatures(bundle) => {
                let added = self.import_guarantor_signatures(&bundle)?;
                Ok(ImportOutcome::GuarantorSignatures {
                    voucher_id: bundle.voucher_id,
                    added,
                })
            }
            ExchangePayload::Payment(bundle) => {
                let amount = bundle.amount;
                let filed = self.receive(bundle)?;
                Ok(ImportOutcome::Payment { amount, filed })
            }
        }
    }

    // --- collection maintenance --------------------------------------------

    /// Trash a voucher; trashing it again deletes its file for good.
    pub fn trash(&mut self, local_id: &str) -> Result<TrashResult, ProfileError> {
        let (status, voucher) = self
            .collection
            .find(local_id)
            .ok_or_else(|| ProfileError::VoucherNotFound(local_id.to_string()))?;
        if status == VoucherStatus::Trashed {
            // The file goes first; the voucher is dropped only once it is gone.
            self.store.delete_voucher(voucher)?;
        }
        let outcome = self.commit(|collection, _, _| {
            collection
                .trash(local_id)
                .ok_or_else(|| ProfileError::VoucherNotFound(local_id.to_string()))
        })?;
        Ok(match outcome {
            TrashOutcome::Trashed => TrashResult::Trashed,
            TrashOutcome::Deleted(_) => TrashResult::Deleted,
        })
    }

    pub fn archive(&mut self, local_id: &str) -> Result<VoucherStatus, ProfileError> {
        self.commit(|collection, _, _| {
            collection
                .archive(local_id)
                .ok_or_else(|| ProfileError::VoucherNotFound(local_id.to_string()))
        })
    }

    pub fn restore(&mut self, local_id: &str) -> Result<VoucherStatus, ProfileError> {
        self.commit(|collection, _, _| {
            collection
                .restore(local_id)
                .ok_or_else(|| ProfileError::VoucherNotFound(local_id.to_string()))
        })
    }

    /// Compare this profile's copies with copies collected from other
    /// holders and report double spends.
    pub fn audit(&self, others: &[Voucher]) -> Vec<DoubleSpendEvidence> {
        let own = self.collection.iter().map(|(_, v)| v);
        find_conflicts(own.chain(others.iter()))
    }
}
