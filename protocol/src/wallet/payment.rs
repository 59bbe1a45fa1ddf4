//! Multi-voucher payments.
//!
//! [`send`] assembles an exact amount out of the holder's spendable
//! vouchers; [`receive`] checks an incoming [`UserTransaction`] and files
//! its vouchers. Both are all-or-nothing: either every voucher involved is
//! updated, or the collection is exactly as it was.
//!
//! # Selection Order
//!
//! Candidates are the holder's `own` vouchers first, then `other`. Within
//! each partition the smallest available balance goes first (ties broken
//! by earlier validity, then voucher id, then local id), so small
//! fragments are used up before large ones are broken. Expired vouchers are
//! never selected. Only the last voucher drawn is split.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::collection::VoucherCollection;
use super::lifecycle::VoucherStatus;
use crate::error::ErrorCategory;
use crate::identity::Identity;
use crate::transaction::{apply_transfer, TransactionRecord, TransferError};
use crate::voucher::{now_millis, verify_voucher, Amount, LocalState, Voucher};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount must be > 0")]
    ZeroAmount,

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("transfer of voucher {voucher_id} failed: {source}")]
    Transfer {
        voucher_id: String,
        #[source]
        source: TransferError,
    },

    #[error("voucher {voucher_id} failed verification: {reason}")]
    TransactionVerificationFailed { voucher_id: String, reason: String },

    #[error("payment is addressed to {recipient_id}")]
    WrongRecipient { recipient_id: String },

    #[error("payment bundle is malformed: {0}")]
    MalformedBundle(String),
}

impl PaymentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PaymentError::Transfer { source, .. } => source.category(),
            PaymentError::TransactionVerificationFailed { .. }
            | PaymentError::MalformedBundle(_) => ErrorCategory::Cryptographic,
            PaymentError::ZeroAmount
            | PaymentError::InsufficientFunds { .. }
            | PaymentError::WrongRecipient { .. } => ErrorCategory::State,
        }
    }
}

/// A payment in transit: the recipient's copies of every voucher drawn,
/// each ending in the record that pays them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTransaction {
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: Amount,
    /// One record per voucher, in the order the vouchers were drawn.
    pub records: Vec<TransactionRecord>,
    pub vouchers: Vec<Voucher>,
    /// Set only when every per-voucher transfer succeeded.
    pub transaction_successful: bool,
}

struct Draw {
    local_id: String,
    amount: Amount,
}

/// Pick vouchers and per-voucher amounts covering exactly `amount`.
fn plan(collection: &VoucherCollection, amount: Amount, now_ms: u64) -> Result<Vec<Draw>, PaymentError> {
    let holder = collection.holder_id();
    let mut draws = Vec::new();
    let mut remaining = amount;
    let mut available_total = Amount::ZERO;

    for status in VoucherStatus::ALL.into_iter().filter(|s| s.is_spendable()) {
        let mut candidates: Vec<(&Voucher, Amount)> = collection
            .partition(status)
            .iter()
            .filter(|v| !v.is_expired_at(now_ms))
            .map(|v| (v, v.amount_available_to(holder)))
            .filter(|(_, available)| !available.is_zero())
            .collect();
        candidates.sort_by(|(a, a_avail), (b, b_avail)| {
            a_avail
                .cmp(b_avail)
                .then_with(|| a.creation.validity.cmp(&b.creation.validity))
                .then_with(|| a.voucher_id().cmp(b.voucher_id()))
                .then_with(|| a.local.local_id.cmp(&b.local.local_id))
        });

        for (voucher, available) in candidates {
            available_total = available_total.checked_add(available).unwrap_or(available_total);
            if remaining.is_zero() {
                continue;
            }
            let take = available.min(remaining);
            remaining = remaining.checked_sub(take).unwrap_or(Amount::ZERO);
            draws.push(Draw {
                local_id: voucher.local.local_id.clone().unwrap_or_default(),
                amount: take,
            });
        }
    }

    if !remaining.is_zero() {
        return Err(PaymentError::InsufficientFunds {
            requested: amount,
            available: available_total,
        });
    }
    Ok(draws)
}

/// Pay `amount` to `recipient_id` out of `collection`.
///
/// Transfers are applied to clones; only when all of them succeed are the
/// sender's updated copies put back (fully spent ones land in `used`).
/// The returned bundle carries the recipient's copies with cleared local
/// state.
///
/// # Errors
///
/// `InsufficientFunds` when the spendable total falls short, or the first
/// failing transfer. The collection is untouched on error.
pub fn send(
    collection: &mut VoucherCollection,
    sender: &Identity,
    recipient_id: &str,
    amount: Amount,
) -> Result<UserTransaction, PaymentError> {
    if amount.is_zero() {
        return Err(PaymentError::ZeroAmount);
    }
    let draws = plan(collection, amount, now_millis())?;

    let mut updated = Vec::with_capacity(draws.len());
    for draw in &draws {
        let Some((_, held)) = collection.find(&draw.local_id) else {
            return Err(PaymentError::MalformedBundle(format!(
                "voucher {} disappeared during payment",
                draw.local_id
            )));
        };
        let mut copy = held.clone();
        let record = apply_transfer(&mut copy, sender, recipient_id, draw.amount).map_err(
            |source| PaymentError::Transfer {
                voucher_id: copy.voucher_id().to_string(),
                source,
            },
        )?;
        updated.push((draw.local_id.as_str(), copy, record));
    }

    let mut records = Vec::with_capacity(updated.len());
    let mut vouchers = Vec::with_capacity(updated.len());
    for (local_id, sender_copy, record) in updated {
        let mut recipient_copy = sender_copy.clone();
        recipient_copy.local = LocalState::default();

        collection.take(local_id);
        collection.insert(sender_copy);

        records.push(record);
        vouchers.push(recipient_copy);
    }

    info!(
        recipient = %recipient_id,
        amount = %amount,
        vouchers = vouchers.len(),
        "payment assembled"
    );
    Ok(UserTransaction {
        sender_id: sender.id().to_string(),
        recipient_id: recipient_id.to_string(),
        amount,
        records,
        vouchers,
        transaction_successful: true,
    })
}

fn check_bundle(bundle: &UserTransaction, holder_id: &str) -> Result<(), PaymentError> {
    if bundle.recipient_id != holder_id {
        return Err(PaymentError::WrongRecipient {
            recipient_id: bundle.recipient_id.clone(),
        });
    }
    if !bundle.transaction_successful {
        return Err(PaymentError::MalformedBundle("payment was not completed".into()));
    }
    if bundle.vouchers.is_empty() || bundle.records.len() != bundle.vouchers.len() {
        return Err(PaymentError::MalformedBundle(
            "records do not match vouchers".into(),
        ));
    }

    let mut total = Amount::ZERO;
    for (voucher, record) in bundle.vouchers.iter().zip(&bundle.records) {
        let failed = |reason: String| PaymentError::TransactionVerificationFailed {
            voucher_id: voucher.voucher_id().to_string(),
            reason,
        };
        verify_voucher(voucher).map_err(|e| failed(e.to_string()))?;
        let latest = voucher
            .latest_transaction()
            .ok_or_else(|| failed("no transactions".into()))?;
        if latest != record {
            return Err(failed("newest record differs from the bundle's record".into()));
        }
        if latest.is_initial() || latest.recipient_id != holder_id || latest.sender_id != bundle.sender_id {
            return Err(failed("newest record does not pay this holder".into()));
        }
        total = total
            .checked_add(latest.amount)
            .ok_or_else(|| failed("amount overflow".into()))?;
    }
    if total != bundle.amount {
        return Err(PaymentError::MalformedBundle(format!(
            "records total {total}, bundle claims {}",
            bundle.amount
        )));
    }
    Ok(())
}

/// Verify an incoming payment and file its vouchers.
///
/// Nothing is inserted unless every voucher verifies and ends in a record
/// paying this holder. Copies already held are skipped. Returns the status
/// each newly filed voucher landed in.
pub fn receive(
    collection: &mut VoucherCollection,
    bundle: UserTransaction,
) -> Result<Vec<VoucherStatus>, PaymentError> {
    if let Err(e) = check_bundle(&bundle, collection.holder_id()) {
        warn!(sender = %bundle.sender_id, error = %e, "payment rejected");
        return Err(e);
    }

    let statuses: Vec<VoucherStatus> = bundle
        .vouchers
        .into_iter()
        .filter_map(|voucher| collection.insert(voucher))
        .collect();
    info!(
        sender = %bundle.sender_id,
        amount = %bundle.amount,
        filed = statuses.len(),
        "payment received"
    );
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PersonInfo;
    use crate::voucher::{sign_as_creator, sign_as_guarantor, VoucherDraft};

    fn whole(n: u64) -> Amount {
        Amount::from_whole(n).unwrap()
    }

    fn finalized(creator: &Identity, face: u64) -> Voucher {
        let (guarantor, _) = Identity::generate().unwrap();
        let mut v = Voucher::create(
            creator,
            VoucherDraft::new(PersonInfo::default(), whole(face), "Berlin"),
        )
        .unwrap();
        sign_as_guarantor(&mut v, &guarantor, &PersonInfo::default()).unwrap();
        sign_as_creator(&mut v, creator).unwrap();
        v
    }

    fn wallet_with(holder: &Identity, faces: &[u64]) -> VoucherCollection {
        let mut collection = VoucherCollection::new(holder.id());
        for face in faces {
            collection.insert(finalized(holder, *face));
        }
        collection
    }

    #[test]
    fn exact_payment_across_vouchers() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let mut alice_wallet = wallet_with(&alice, &[10, 30, 5]);

        let bundle = send(&mut alice_wallet, &alice, bob.id(), whole(20)).unwrap();
        // 5 and 10 are used up, 5 comes out of the 30.
        assert_eq!(bundle.vouchers.len(), 3);
        assert_eq!(bundle.records[2].amount, whole(5));
        assert_eq!(alice_wallet.total_available(VoucherStatus::Own), whole(25));
        assert_eq!(alice_wallet.partition(VoucherStatus::Used).len(), 2);

        let mut bob_wallet = VoucherCollection::new(bob.id());
        let statuses = receive(&mut bob_wallet, bundle).unwrap();
        assert_eq!(statuses, vec![VoucherStatus::Other; 3]);
        assert_eq!(bob_wallet.total_available(VoucherStatus::Other), whole(20));
    }

    #[test]
    fn insufficient_funds_changes_nothing() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let mut wallet = wallet_with(&alice, &[10, 5]);
        let before: Vec<Voucher> = wallet.iter().map(|(_, v)| v.clone()).collect();

        let err = send(&mut wallet, &alice, bob.id(), whole(16)).unwrap_err();
        assert!(matches!(
            err,
            PaymentError::InsufficientFunds { available, .. } if available == whole(15)
        ));
        let after: Vec<Voucher> = wallet.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(wallet.partition(VoucherStatus::Own).len(), 2);
    }

    #[test]
    fn failed_transfer_rolls_back() {
        let (alice, _) = Identity::generate().unwrap();
        let mut wallet = wallet_with(&alice, &[10, 5]);
        let err = send(&mut wallet, &alice, "garbage", whole(12)).unwrap_err();
        assert!(matches!(err, PaymentError::Transfer { .. }));
        assert_eq!(wallet.total_available(VoucherStatus::Own), whole(15));
        assert!(wallet.partition(VoucherStatus::Used).is_empty());
    }

    #[test]
    fn receive_rejects_whole_bundle_on_one_bad_voucher() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let mut alice_wallet = wallet_with(&alice, &[10, 10]);
        let mut bundle = send(&mut alice_wallet, &alice, bob.id(), whole(15)).unwrap();
        bundle.vouchers[1].creation.region = "Forged".into();

        let mut bob_wallet = VoucherCollection::new(bob.id());
        assert!(matches!(
            receive(&mut bob_wallet, bundle),
            Err(PaymentError::TransactionVerificationFailed { .. })
        ));
        assert!(bob_wallet.is_empty());
    }

    #[test]
    fn receive_rejects_payment_for_someone_else() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let (carol, _) = Identity::generate().unwrap();
        let mut alice_wallet = wallet_with(&alice, &[10]);
        let bundle = send(&mut alice_wallet, &alice, bob.id(), whole(3)).unwrap();

        let mut carol_wallet = VoucherCollection::new(carol.id());
        assert!(matches!(
            receive(&mut carol_wallet, bundle),
            Err(PaymentError::WrongRecipient { .. })
        ));
    }

    #[test]
    fn receiving_twice_files_once() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let mut alice_wallet = wallet_with(&alice, &[10]);
        let bundle = send(&mut alice_wallet, &alice, bob.id(), whole(4)).unwrap();

        let mut bob_wallet = VoucherCollection::new(bob.id());
        assert_eq!(receive(&mut bob_wallet, bundle.clone()).unwrap().len(), 1);
        assert!(receive(&mut bob_wallet, bundle).unwrap().is_empty());
        assert_eq!(bob_wallet.total_available(VoucherStatus::Other), whole(4));
    }
}
