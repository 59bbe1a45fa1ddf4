//! Voucher verification: guarantor signatures, creator signature and the
//! transaction chain.
//!
//! Every check here is a pure function of the voucher's content. Any
//! failure comes back as [`VoucherError::SignatureInvalid`] with a reason
//! naming the first broken rule. Within each check the cheap comparisons
//! run before signature verification.

use tracing::warn;

use super::model::{GuarantorSignature, Voucher};
use super::VoucherError;
use crate::identity::Identity;
use crate::transaction::TransactionRecord;

/// Verify one guarantor entry against the voucher's creation payload.
pub(crate) fn verify_guarantor_entry(
    voucher: &Voucher,
    entry: &GuarantorSignature,
) -> Result<(), VoucherError> {
    let guarantor_id = &entry.guarantor_info.id;
    if guarantor_id == voucher.creator_id() {
        return Err(VoucherError::invalid("creator signed as guarantor"));
    }
    let payload = voucher.guarantor_payload(&entry.guarantor_info)?;
    if !Identity::verify_hex(guarantor_id, &payload, &entry.signature) {
        return Err(VoucherError::invalid(format!(
            "guarantor signature of {guarantor_id} does not verify"
        )));
    }
    Ok(())
}

/// Verify every guarantor entry. Guarantors must be distinct parties.
pub fn verify_guarantor_signatures(voucher: &Voucher) -> Result<(), VoucherError> {
    for (i, entry) in voucher.guarantor_signatures.iter().enumerate() {
        let seen_before = voucher.guarantor_signatures[..i]
            .iter()
            .any(|other| other.guarantor_info.id == entry.guarantor_info.id);
        if seen_before {
            return Err(VoucherError::invalid(format!(
                "guarantor {} appears twice",
                entry.guarantor_info.id
            )));
        }
        verify_guarantor_entry(voucher, entry)?;
    }
    Ok(())
}

/// Verify the creator signature over creation payload ‖ guarantor entries.
pub fn verify_creator_signature(voucher: &Voucher) -> Result<(), VoucherError> {
    let signature = voucher
        .creator_signature
        .as_deref()
        .ok_or_else(|| VoucherError::invalid("creator signature missing"))?;
    let payload = voucher.creator_payload()?;
    if !Identity::verify_hex(voucher.creator_id(), &payload, signature) {
        return Err(VoucherError::invalid("creator signature does not verify"));
    }
    Ok(())
}

/// Verify the transaction history.
///
/// The first record must be the creator's signed self-record over the full
/// face value. Each later record must spend a live fragment of its
/// predecessor:
///
/// 1. same voucher, `previous_t_id` links to the predecessor;
/// 2. sender and recipient differ, and the sender appears in the predecessor;
/// 3. `previous_balance` is what the predecessor left the sender;
/// 4. `amount > 0` and `new_balance = previous_balance - amount`;
/// 5. `t_id` matches the record's bytes and the sender's signature verifies.
///
/// An unfinished voucher must have no records at all.
pub fn verify_transaction_chain(voucher: &Voucher) -> Result<(), VoucherError> {
    let Some((first, rest)) = voucher.transactions.split_first() else {
        if voucher.is_finalized() {
            return Err(VoucherError::invalid(
                "finalized voucher has no initial transaction",
            ));
        }
        return Ok(());
    };
    if !voucher.is_finalized() {
        return Err(VoucherError::invalid(
            "unfinished voucher carries transactions",
        ));
    }

    verify_initial_record(voucher, first)?;

    let mut previous = first;
    for (index, record) in rest.iter().enumerate() {
        verify_link(voucher, previous, record)
            .map_err(|reason| VoucherError::invalid(format!("transaction {}: {reason}", index + 1)))?;
        previous = record;
    }
    Ok(())
}

fn verify_initial_record(voucher: &Voucher, record: &TransactionRecord) -> Result<(), VoucherError> {
    let face_value = voucher.face_value();
    let creator = voucher.creator_id();

    let reason = if record.voucher_id != voucher.voucher_id() {
        Some("initial transaction belongs to another voucher")
    } else if !record.is_initial() {
        Some("initial transaction links to a predecessor")
    } else if record.sender_id != creator || record.recipient_id != creator {
        Some("initial transaction is not creator to creator")
    } else if record.amount != face_value
        || record.previous_balance != face_value
        || record.new_balance != face_value
    {
        Some("initial transaction does not carry the face value")
    } else if record.t_id != record.compute_id() {
        Some("initial transaction id mismatch")
    } else if !record.verify_signature() {
        Some("initial transaction signature does not verify")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(VoucherError::invalid(reason)),
        None => Ok(()),
    }
}

fn verify_link(
    voucher: &Voucher,
    previous: &TransactionRecord,
    record: &TransactionRecord,
) -> Result<(), String> {
    if record.voucher_id != voucher.voucher_id() {
        return Err("belongs to another voucher".into());
    }
    if record.previous_t_id.as_deref() != Some(previous.t_id.as_str()) {
        return Err("does not link to its predecessor".into());
    }
    if record.sender_id == record.recipient_id {
        return Err("sender and recipient are the same".into());
    }
    if !previous.involves(&record.sender_id) {
        return Err(format!("{} held no fragment to spend", record.sender_id));
    }
    let available = previous.balance_of(&record.sender_id);
    if record.previous_balance != available {
        return Err(format!(
            "previous balance {} does not match available {available}",
            record.previous_balance
        ));
    }
    if record.amount.is_zero() {
        return Err("zero amount".into());
    }
    if record.previous_balance.checked_sub(record.amount) != Some(record.new_balance) {
        return Err("balances do not add up".into());
    }
    if record.t_id != record.compute_id() {
        return Err("transaction id mismatch".into());
    }
    if !record.verify_signature() {
        return Err("sender signature does not verify".into());
    }
    Ok(())
}

/// Full verification: guarantors, creator (once finalized) and chain.
pub fn verify_voucher(voucher: &Voucher) -> Result<(), VoucherError> {
    let result = verify_guarantor_signatures(voucher)
        .and_then(|_| {
            if voucher.is_finalized() {
                if voucher.guarantor_signatures.is_empty() {
                    return Err(VoucherError::invalid("finalized without a guarantor"));
                }
                verify_creator_signature(voucher)
            } else {
                Ok(())
            }
        })
        .and_then(|_| verify_transaction_chain(voucher));

    if let Err(ref e) = result {
        warn!(voucher_id = %voucher.voucher_id(), error = %e, "voucher failed verification");
    }
    result
}
