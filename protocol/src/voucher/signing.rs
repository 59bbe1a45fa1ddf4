//! Guarantor and creator signing.
//!
//! Signing is separate from construction: the creator builds the voucher,
//! hands it to guarantors one by one (as a file), collects their entries
//! and only then closes it with the creator signature.

use tracing::{debug, info};

use super::model::{now_millis, GuarantorSignature, GuarantorSignatureBundle, Voucher};
use super::verification::{verify_guarantor_entry, verify_guarantor_signatures};
use super::VoucherError;
use crate::identity::{GuarantorInfo, Identity, PersonInfo};
use crate::transaction::TransactionRecord;

/// Attach `guarantor`'s attestation to an unfinished voucher.
///
/// Returns the new entry so it can also be shipped back to the creator on
/// its own (see [`GuarantorSignatureBundle`]).
///
/// # Errors
///
/// - `AlreadyFinalized` once the creator has signed.
/// - `SelfGuarantor` if `guarantor` is the creator.
/// - `DuplicateGuarantor` if this guarantor already signed.
pub fn sign_as_guarantor(
    voucher: &mut Voucher,
    guarantor: &Identity,
    person: &PersonInfo,
) -> Result<GuarantorSignature, VoucherError> {
    if voucher.is_finalized() {
        return Err(VoucherError::AlreadyFinalized);
    }
    if guarantor.id() == voucher.creator_id() {
        return Err(VoucherError::SelfGuarantor);
    }
    if voucher.has_guarantor(guarantor.id()) {
        return Err(VoucherError::DuplicateGuarantor {
            guarantor_id: guarantor.id().to_string(),
        });
    }

    let guarantor_info = GuarantorInfo::from_person(guarantor.id(), person, now_millis());
    let payload = voucher.guarantor_payload(&guarantor_info)?;
    let entry = GuarantorSignature {
        guarantor_info,
        signature: guarantor.sign(&payload).to_hex(),
    };
    voucher.guarantor_signatures.push(entry.clone());

    info!(
        voucher_id = %voucher.voucher_id(),
        guarantor = %guarantor.id(),
        guarantors = voucher.guarantor_signatures.len(),
        "voucher guaranteed"
    );
    Ok(entry)
}

/// Close the voucher: sign creation payload ‖ guarantor entries and append
/// the initial record that puts the full face value with the creator.
///
/// Guarantor entries are verified first. A creator never finalizes over a
/// signature that does not check out.
pub fn sign_as_creator(voucher: &mut Voucher, creator: &Identity) -> Result<(), VoucherError> {
    if creator.id() != voucher.creator_id() {
        return Err(VoucherError::ForeignVoucher {
            creator_id: voucher.creator_id().to_string(),
        });
    }
    if voucher.is_finalized() {
        return Err(VoucherError::AlreadyFinalized);
    }
    if voucher.guarantor_signatures.is_empty() {
        return Err(VoucherError::NoGuarantor);
    }
    verify_guarantor_signatures(voucher)?;

    let payload = voucher.creator_payload()?;
    let face_value = voucher.face_value();
    let mut initial = TransactionRecord::unsigned(
        voucher.voucher_id(),
        None,
        creator.id(),
        creator.id(),
        face_value,
        face_value,
        face_value,
        now_millis(),
    );
    initial.sign(creator);

    voucher.creator_signature = Some(creator.sign(&payload).to_hex());
    voucher.transactions.push(initial);

    info!(
        voucher_id = %voucher.voucher_id(),
        amount = %face_value,
        "voucher finalized"
    );
    Ok(())
}

/// Merge guarantor entries received from guarantors into the creator's
/// unfinished copy.
///
/// All entries are checked before any is added, so a bundle with one bad
/// entry changes nothing. Entries from guarantors already on the voucher
/// are skipped. Returns how many entries were added.
pub fn merge_guarantor_signatures(
    voucher: &mut Voucher,
    bundle: &GuarantorSignatureBundle,
) -> Result<usize, VoucherError> {
    if bundle.voucher_id != voucher.voucher_id() {
        return Err(VoucherError::VoucherMismatch {
            expected: voucher.voucher_id().to_string(),
            got: bundle.voucher_id.clone(),
        });
    }
    if voucher.is_finalized() {
        return Err(VoucherError::AlreadyFinalized);
    }

    let mut accepted: Vec<GuarantorSignature> = Vec::new();
    for entry in &bundle.entries {
        let guarantor_id = &entry.guarantor_info.id;
        if guarantor_id == voucher.creator_id() {
            return Err(VoucherError::SelfGuarantor);
        }
        verify_guarantor_entry(voucher, entry)?;
        let already_present = voucher.has_guarantor(guarantor_id)
            || accepted.iter().any(|a| &a.guarantor_info.id == guarantor_id);
        if already_present {
            debug!(guarantor = %guarantor_id, "skipping known guarantor entry");
            continue;
        }
        accepted.push(entry.clone());
    }

    let added = accepted.len();
    voucher.guarantor_signatures.extend(accepted);
    info!(voucher_id = %voucher.voucher_id(), added, "guarantor signatures merged");
    Ok(added)
}
