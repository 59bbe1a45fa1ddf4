//! The voucher record and its canonical signing payloads.

use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::amount::Amount;
use super::VoucherError;
use crate::codec::{canonical_bytes, CodecError};
use crate::config::{CURRENCY_NAME, LOCAL_ID_LENGTH, MAX_YEARS_VALID};
use crate::crypto::hash::blake3_hash_multi;
use crate::identity::{GuarantorInfo, Identity, PersonInfo};
use crate::transaction::TransactionRecord;

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Last millisecond (UTC) of the calendar year `years` after `now_ms`.
pub fn end_of_year_millis(now_ms: u64, years: u32) -> Option<u64> {
    let now = Utc.timestamp_millis_opt(i64::try_from(now_ms).ok()?).single()?;
    let year = now.year().checked_add(i32::try_from(years).ok()?)?;
    let last_second = Utc
        .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
        .single()?
        .timestamp_millis();
    u64::try_from(last_second).ok()?.checked_add(999)
}

// ---------------------------------------------------------------------------
// Signed parts
// ---------------------------------------------------------------------------

/// Immutable creation data. Everything here is covered by every guarantor
/// signature and by the creator signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationBlock {
    /// Lineage id shared by every holder's copy of this voucher.
    pub voucher_id: String,
    pub currency: String,
    pub creator_id: String,
    /// Creator's contact card as of creation time.
    pub creator: PersonInfo,
    /// Face value.
    pub amount: Amount,
    /// Region in which the creator promises to honor the voucher.
    pub region: String,
    /// Unix milliseconds.
    pub creation_date: u64,
    /// Absolute expiry, Unix milliseconds.
    pub validity: u64,
    pub description: Option<String>,
    pub footnote: Option<String>,
    pub is_test_voucher: bool,
}

/// One detached guarantor attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuarantorSignature {
    pub guarantor_info: GuarantorInfo,
    /// Hex Ed25519 signature over creation payload ‖ canonical(guarantor_info).
    pub signature: String,
}

/// Guarantor signatures travelling on their own, back to the creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuarantorSignatureBundle {
    pub voucher_id: String,
    pub entries: Vec<GuarantorSignature>,
}

/// Input for [`Voucher::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherDraft {
    pub creator: PersonInfo,
    pub amount: Amount,
    pub region: String,
    pub years_valid: u32,
    pub is_test_voucher: bool,
    pub description: Option<String>,
    pub footnote: Option<String>,
}

impl VoucherDraft {
    pub fn new(creator: PersonInfo, amount: Amount, region: impl Into<String>) -> Self {
        Self {
            creator,
            amount,
            region: region.into(),
            years_valid: 1,
            is_test_voucher: false,
            description: None,
            footnote: None,
        }
    }

    pub fn years_valid(mut self, years: u32) -> Self {
        self.years_valid = years;
        self
    }

    pub fn test_voucher(mut self, is_test: bool) -> Self {
        self.is_test_voucher = is_test;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn footnote(mut self, text: impl Into<String>) -> Self {
        self.footnote = Some(text.into());
        self
    }
}

/// Progress through the signature protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureState {
    /// No signatures at all.
    Created,
    /// At least one guarantor has signed; the creator has not.
    GuarantorSigned,
    /// Creator signed; the voucher can be spent.
    Finalized,
}

// ---------------------------------------------------------------------------
// Voucher
// ---------------------------------------------------------------------------

/// Holder-local bookkeeping. Never serialized, never signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    pub file_path: Option<PathBuf>,
    pub local_id: Option<String>,
    pub trashed: bool,
    pub archived: bool,
}

/// A Minuto voucher as one holder sees it.
///
/// Every holder keeps their own copy. Copies of the same voucher share
/// `creation.voucher_id` and a common history prefix, and diverge where
/// different holders spent different fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub creation: CreationBlock,
    pub guarantor_signatures: Vec<GuarantorSignature>,
    pub creator_signature: Option<String>,
    pub transactions: Vec<TransactionRecord>,
    #[serde(skip)]
    pub local: LocalState,
}

impl PartialEq for Voucher {
    /// Content equality. Where a copy happens to live on disk is irrelevant.
    fn eq(&self, other: &Self) -> bool {
        self.creation == other.creation
            && self.guarantor_signatures == other.guarantor_signatures
            && self.creator_signature == other.creator_signature
            && self.transactions == other.transactions
    }
}

impl Eq for Voucher {}

impl Voucher {
    /// Start a new, unsigned voucher issued by `creator`.
    ///
    /// Validity runs to the end of the calendar year `years_valid` years
    /// from now.
    pub fn create(creator: &Identity, draft: VoucherDraft) -> Result<Self, VoucherError> {
        if draft.amount.is_zero() {
            return Err(VoucherError::InvalidDraft("amount must be positive".into()));
        }
        if draft.years_valid == 0 || draft.years_valid > MAX_YEARS_VALID {
            return Err(VoucherError::InvalidDraft(format!(
                "years_valid must be between 1 and {MAX_YEARS_VALID}"
            )));
        }
        let creation_date = now_millis();
        let validity = end_of_year_millis(creation_date, draft.years_valid)
            .ok_or_else(|| VoucherError::InvalidDraft("validity out of range".into()))?;

        Ok(Self {
            creation: CreationBlock {
                voucher_id: Uuid::new_v4().to_string(),
                currency: CURRENCY_NAME.to_string(),
                creator_id: creator.id().to_string(),
                creator: draft.creator,
                amount: draft.amount,
                region: draft.region,
                creation_date,
                validity,
                description: draft.description,
                footnote: draft.footnote,
                is_test_voucher: draft.is_test_voucher,
            },
            guarantor_signatures: Vec::new(),
            creator_signature: None,
            transactions: Vec::new(),
            local: LocalState::default(),
        })
    }

    pub fn voucher_id(&self) -> &str {
        &self.creation.voucher_id
    }

    pub fn creator_id(&self) -> &str {
        &self.creation.creator_id
    }

    pub fn face_value(&self) -> Amount {
        self.creation.amount
    }

    pub fn signature_state(&self) -> SignatureState {
        if self.creator_signature.is_some() {
            SignatureState::Finalized
        } else if !self.guarantor_signatures.is_empty() {
            SignatureState::GuarantorSigned
        } else {
            SignatureState::Created
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.signature_state() == SignatureState::Finalized
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.creation.validity
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn has_guarantor(&self, party_id: &str) -> bool {
        self.guarantor_signatures
            .iter()
            .any(|g| g.guarantor_info.id == party_id)
    }

    // --- canonical payloads ------------------------------------------------

    /// What guarantors and the creator ultimately vouch for.
    pub fn creation_payload(&self) -> Result<Vec<u8>, CodecError> {
        canonical_bytes(&self.creation)
    }

    /// creation payload ‖ canonical(guarantor info).
    pub fn guarantor_payload(&self, info: &GuarantorInfo) -> Result<Vec<u8>, CodecError> {
        let mut payload = self.creation_payload()?;
        payload.extend_from_slice(&canonical_bytes(info)?);
        Ok(payload)
    }

    /// creation payload ‖ canonical(all guarantor signatures).
    pub fn creator_payload(&self) -> Result<Vec<u8>, CodecError> {
        let mut payload = self.creation_payload()?;
        payload.extend_from_slice(&canonical_bytes(&self.guarantor_signatures)?);
        Ok(payload)
    }

    // --- balances ----------------------------------------------------------

    pub fn latest_transaction(&self) -> Option<&TransactionRecord> {
        self.transactions.last()
    }

    /// What `holder_id` can spend from this copy.
    ///
    /// Only the latest record counts: it leaves the remainder with its
    /// sender and the transferred amount with its recipient. A party that
    /// is neither has nothing here, since the voucher has moved on from them.
    pub fn amount_available_to(&self, holder_id: &str) -> Amount {
        self.latest_transaction()
            .map(|record| record.balance_of(holder_id))
            .unwrap_or(Amount::ZERO)
    }

    /// Whether `party_id` appears in the latest record, i.e. holds one of
    /// the two live fragments of this copy.
    pub fn is_current_holder(&self, party_id: &str) -> bool {
        self.latest_transaction()
            .is_some_and(|record| record.involves(party_id))
    }

    // --- local bookkeeping -------------------------------------------------

    /// Short id naming this holder's copy on disk. Stable as long as the
    /// history does not grow.
    pub fn compute_local_id(&self, holder_id: &str) -> String {
        let latest = self
            .latest_transaction()
            .map(|r| r.t_id.as_str())
            .unwrap_or("");
        let signature_count = self.guarantor_signatures.len().to_le_bytes();
        let finalized = [u8::from(self.is_finalized())];
        let digest = blake3_hash_multi(&[
            self.voucher_id().as_bytes(),
            holder_id.as_bytes(),
            latest.as_bytes(),
            &signature_count,
            &finalized,
        ]);
        hex::encode(digest)[..LOCAL_ID_LENGTH].to_string()
    }

    /// Same lineage at the same point in history: a duplicate copy.
    pub fn same_version(&self, other: &Voucher) -> bool {
        self.voucher_id() == other.voucher_id()
            && self.creator_signature == other.creator_signature
            && self.guarantor_signatures.len() == other.guarantor_signatures.len()
            && self.latest_transaction().map(|r| &r.t_id)
                == other.latest_transaction().map(|r| &r.t_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(amount: u64) -> VoucherDraft {
        VoucherDraft::new(
            PersonInfo::named("Ada", "Lovelace"),
            Amount::from_whole(amount).unwrap(),
            "Berlin",
        )
    }

    #[test]
    fn create_sets_creation_block() {
        let (creator, _) = Identity::generate().unwrap();
        let v = Voucher::create(&creator, draft(50).years_valid(3).footnote("thanks")).unwrap();
        assert_eq!(v.creator_id(), creator.id());
        assert_eq!(v.face_value(), Amount::from_whole(50).unwrap());
        assert_eq!(v.creation.currency, "Minuto");
        assert_eq!(v.creation.footnote.as_deref(), Some("thanks"));
        assert_eq!(v.signature_state(), SignatureState::Created);
        assert!(v.creation.validity > v.creation.creation_date);
        assert!(!v.is_expired());
        assert_eq!(v.amount_available_to(creator.id()), Amount::ZERO);
    }

    #[test]
    fn create_rejects_bad_drafts() {
        let (creator, _) = Identity::generate().unwrap();
        assert!(matches!(
            Voucher::create(&creator, draft(0)),
            Err(VoucherError::InvalidDraft(_))
        ));
        assert!(matches!(
            Voucher::create(&creator, draft(5).years_valid(0)),
            Err(VoucherError::InvalidDraft(_))
        ));
    }

    #[test]
    fn validity_is_end_of_year() {
        // 2024-06-15T12:00:00Z
        let now = 1_718_452_800_000;
        let end = end_of_year_millis(now, 2).unwrap();
        let expected = Utc
            .with_ymd_and_hms(2026, 12, 31, 23, 59, 59)
            .unwrap()
            .timestamp_millis() as u64
            + 999;
        assert_eq!(end, expected);
    }

    #[test]
    fn payloads_extend_creation_payload() {
        let (creator, _) = Identity::generate().unwrap();
        let v = Voucher::create(&creator, draft(10)).unwrap();
        let base = v.creation_payload().unwrap();
        let info = GuarantorInfo::from_person("minuto1g", &PersonInfo::default(), 1);
        assert!(v.guarantor_payload(&info).unwrap().starts_with(&base));
        assert!(v.creator_payload().unwrap().starts_with(&base));
    }

    #[test]
    fn equality_ignores_local_state() {
        let (creator, _) = Identity::generate().unwrap();
        let v = Voucher::create(&creator, draft(10)).unwrap();
        let mut w = v.clone();
        w.local.trashed = true;
        w.local.file_path = Some(PathBuf::from("/tmp/x.mv"));
        assert_eq!(v, w);
    }

    #[test]
    fn local_id_depends_on_holder() {
        let (creator, _) = Identity::generate().unwrap();
        let v = Voucher::create(&creator, draft(10)).unwrap();
        let a = v.compute_local_id("minuto1a");
        assert_eq!(a.len(), LOCAL_ID_LENGTH);
        assert_eq!(a, v.compute_local_id("minuto1a"));
        assert_ne!(a, v.compute_local_id("minuto1b"));
    }
}
