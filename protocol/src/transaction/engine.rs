//! Applying a single transfer to one voucher.

use tracing::{debug, info};

use super::record::TransactionRecord;
use super::TransferError;
use crate::identity::{decode_id, Identity};
use crate::voucher::{now_millis, verify_voucher, Amount, Voucher};

/// Spend `amount` of `sender`'s fragment of `voucher` to `recipient_id`.
///
/// On success the new signed record has been appended to `voucher` and is
/// also returned. The caller hands the recipient a clone of the voucher
/// and keeps the mutated original as the sender's remainder.
///
/// The checks, in order:
///
/// 1. voucher finalized and not expired;
/// 2. recipient is a well-formed id other than the sender;
/// 3. sender holds a fragment (appears in the latest record);
/// 4. amount is positive and does not exceed the fragment;
/// 5. the whole voucher verifies.
///
/// # Errors
///
/// The first failing check. Nothing is appended on error.
pub fn apply_transfer(
    voucher: &mut Voucher,
    sender: &Identity,
    recipient_id: &str,
    amount: Amount,
) -> Result<TransactionRecord, TransferError> {
    if !voucher.is_finalized() {
        return Err(TransferError::VoucherNotFinalized);
    }
    let now = now_millis();
    if voucher.is_expired_at(now) {
        return Err(TransferError::VoucherExpired {
            validity: voucher.creation.validity,
        });
    }
    if recipient_id == sender.id() {
        return Err(TransferError::SelfTransfer);
    }
    decode_id(recipient_id).map_err(|e| TransferError::InvalidRecipient(e.to_string()))?;

    let previous = voucher
        .latest_transaction()
        .filter(|record| record.involves(sender.id()))
        .ok_or_else(|| TransferError::NotCurrentHolder {
            sender_id: sender.id().to_string(),
        })?;

    if amount.is_zero() {
        return Err(TransferError::ZeroAmount);
    }
    let available = previous.balance_of(sender.id());
    let new_balance = available
        .checked_sub(amount)
        .ok_or(TransferError::InsufficientBalance {
            available,
            requested: amount,
        })?;

    verify_voucher(voucher)?;

    // Records stay in timestamp order even if the local clock went backwards.
    let timestamp = now.max(previous.timestamp);
    let mut record = TransactionRecord::unsigned(
        voucher.voucher_id(),
        Some(previous.t_id.clone()),
        sender.id(),
        recipient_id,
        amount,
        available,
        new_balance,
        timestamp,
    );
    record.sign(sender);
    debug!(t_id = %record.t_id, "transfer record signed");

    voucher.transactions.push(record.clone());
    info!(
        voucher_id = %voucher.voucher_id(),
        amount = %amount,
        remainder = %new_balance,
        "transfer applied"
    );
    Ok(record)
}
