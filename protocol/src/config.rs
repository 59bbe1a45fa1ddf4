//! # Protocol Configuration & Constants
//!
//! Every magic number in Minuto lives here: file layout, currency unit,
//! identifier prefixes and key-derivation sizes. Runtime knobs (where the
//! data lives, how hard Argon2 works) are bundled in [`StoreConfig`].
//!
//! Changing a file-layout constant after profiles exist in the wild strands
//! their data, so treat the first two sections as frozen.

use std::path::{Path, PathBuf};

use crate::crypto::kdf::KdfParams;

// ---------------------------------------------------------------------------
// File Layout
// ---------------------------------------------------------------------------

/// Default data root, relative to the working directory of the shell.
pub const DEFAULT_DATA_FOLDER: &str = "mdata";

/// Fixed filename of the encrypted profile record under the data root.
pub const PROFILE_FILENAME: &str = "userprofile.dat";

/// Prefix of every voucher file name.
pub const VOUCHER_FILE_PREFIX: &str = "eMinuto-";

/// Extension of every voucher file name.
pub const VOUCHER_FILE_EXTENSION: &str = "mv";

/// Suffix appended to a file while it is being written. A crash mid-write
/// leaves only a `.tmp` behind, never a truncated voucher.
pub const TEMP_FILE_SUFFIX: &str = "tmp";

/// Marker prefixed to every ciphertext the secure store writes. Plaintext
/// files never start with it, so readers can auto-detect the format.
pub const CIPHERTEXT_MARKER: &[u8; 8] = b"MINUTO\x00E";

/// Version byte following the marker.
pub const ENVELOPE_VERSION: u8 = 1;

/// Format tag written into profile files.
pub const PROFILE_FORMAT: &str = "minuto-profile";

/// Current profile file version.
pub const PROFILE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Name of the currency, written into every voucher.
pub const CURRENCY_NAME: &str = "Minuto";

/// Unit suffix used when displaying amounts ("12.50 M").
pub const CURRENCY_UNIT: &str = "M";

/// Number of decimal places carried by [`Amount`](crate::voucher::Amount).
pub const AMOUNT_DECIMALS: u32 = 2;

/// `10^AMOUNT_DECIMALS`: smallest units per whole Minuto.
pub const AMOUNT_SCALE: u64 = 100;

/// Upper bound on `years_valid` accepted at voucher creation.
pub const MAX_YEARS_VALID: u32 = 99;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Bech32 human-readable prefix of every identity id (`minuto1...`).
pub const ID_HRP: &str = "minuto";

/// Length in bytes of the short public-key fingerprint.
pub const FINGERPRINT_LENGTH: usize = 8;

/// Length in hex characters of a local voucher id.
pub const LOCAL_ID_LENGTH: usize = 16;

/// Path string mixed into the BIP-39 seed when deriving the signing key.
pub const IDENTITY_DERIVATION_PATH: &str = "minuto/identity/0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes (96 bits per NIST SP 800-38D).
pub const AES_NONCE_LENGTH: usize = 12;

/// Salt length for password-based key derivation.
pub const KDF_SALT_LENGTH: usize = 16;

/// BLAKE3 derive-key context for the seed-derived voucher file key.
pub const FILE_KEY_CONTEXT: &str = "minuto 2024 voucher file encryption key v1";

/// BLAKE3 derive-key context for the seed-derived profile recovery key.
pub const RECOVERY_KEY_CONTEXT: &str = "minuto 2024 profile recovery key v1";

/// BLAKE3 derive-key context for the X25519 shared exchange key.
pub const SHARED_KEY_CONTEXT: &str = "minuto 2024 shared exchange key v1";

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Where a profile lives on disk and how its password is stretched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root folder holding the profile file and the status subfolders.
    pub data_root: PathBuf,
    /// Argon2 parameters used when (re)wrapping the profile under a password.
    pub kdf: KdfParams,
}

impl StoreConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            kdf: KdfParams::default(),
        }
    }

    /// Builder-style override of the Argon2 parameters.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Full path of the profile file.
    pub fn profile_path(&self) -> PathBuf {
        self.data_root.join(PROFILE_FILENAME)
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_FOLDER)
    }
}

/// File name of a voucher given its local id: `eMinuto-{local_id}.mv`.
pub fn voucher_file_name(local_id: &str) -> String {
    format!("{VOUCHER_FILE_PREFIX}{local_id}.{VOUCHER_FILE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_scale_matches_decimals() {
        assert_eq!(AMOUNT_SCALE, 10u64.pow(AMOUNT_DECIMALS));
    }

    #[test]
    fn voucher_file_name_format() {
        assert_eq!(voucher_file_name("00ff"), "eMinuto-00ff.mv");
    }

    #[test]
    fn derive_key_contexts_are_distinct() {
        assert_ne!(FILE_KEY_CONTEXT, RECOVERY_KEY_CONTEXT);
        assert_ne!(FILE_KEY_CONTEXT, SHARED_KEY_CONTEXT);
        assert_ne!(RECOVERY_KEY_CONTEXT, SHARED_KEY_CONTEXT);
    }

    #[test]
    fn marker_is_not_valid_json_start() {
        // Plaintext files are JSON; the marker must never be mistaken for one.
        assert_ne!(CIPHERTEXT_MARKER[0], b'{');
        assert_ne!(CIPHERTEXT_MARKER[0], b'[');
    }

    #[test]
    fn default_store_config_uses_data_folder() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.profile_path(), Path::new("mdata").join("userprofile.dat"));
    }

    #[test]
    fn aes_parameters() {
        assert_eq!(AES_KEY_LENGTH, 32);
        assert_eq!(AES_NONCE_LENGTH, 12);
    }
}
