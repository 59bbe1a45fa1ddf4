//! Offline double-spend detection.
//!
//! Nothing stops a holder from spending a fragment twice out of two copies
//! of the same voucher. What they cannot do is hide it: each spend is a
//! signed record naming the fragment it consumed (`sender_id`,
//! `previous_t_id`). Put the diverging copies side by side and two
//! different records consuming the same fragment show up.
//!
//! Legitimate divergence looks different. After a partial transfer both the
//! sender and the recipient spend from the same predecessor, but they are
//! different senders.

use std::collections::BTreeMap;

use tracing::warn;

use crate::transaction::TransactionRecord;
use crate::voucher::{Amount, Voucher};

/// Two or more signed records spending the same fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleSpendEvidence {
    pub voucher_id: String,
    /// The party who spent the fragment more than once.
    pub sender_id: String,
    /// Record whose fragment was spent more than once.
    pub previous_t_id: String,
    /// Size of the fragment every conflicting record claims to spend.
    pub previous_balance: Amount,
    /// Conflicting records, sorted.
    pub conflicting_t_ids: Vec<String>,
    /// Total paid out of the fragment across all conflicting records.
    pub total_spent: Amount,
}

impl DoubleSpendEvidence {
    /// How far the conflicting spends exceed the fragment.
    pub fn overspent(&self) -> Amount {
        self.total_spent
            .checked_sub(self.previous_balance)
            .unwrap_or(Amount::ZERO)
    }
}

/// Compare any number of voucher copies (from any holders) and report every
/// fragment spent by more than one record.
///
/// Records whose id or signature do not check out are ignored; they prove
/// nothing about the sender.
pub fn find_conflicts<'a, I>(copies: I) -> Vec<DoubleSpendEvidence>
where
    I: IntoIterator<Item = &'a Voucher>,
{
    // voucher_id -> t_id -> record
    let mut records: BTreeMap<&str, BTreeMap<&str, &TransactionRecord>> = BTreeMap::new();
    for voucher in copies {
        let known = records.entry(voucher.voucher_id()).or_default();
        for record in &voucher.transactions {
            known.entry(record.t_id.as_str()).or_insert(record);
        }
    }

    let mut evidence = Vec::new();
    for (voucher_id, by_t_id) in records {
        // (sender, previous t_id) -> spends
        let mut spends: BTreeMap<(&str, &str), Vec<&TransactionRecord>> = BTreeMap::new();
        for record in by_t_id.values() {
            let Some(previous) = record.previous_t_id.as_deref() else {
                continue;
            };
            if record.t_id != record.compute_id() || !record.verify_signature() {
                continue;
            }
            spends
                .entry((record.sender_id.as_str(), previous))
                .or_default()
                .push(record);
        }

        for ((sender_id, previous_t_id), conflicting) in spends {
            if conflicting.len() < 2 {
                continue;
            }
            let total_spent = Amount::checked_sum(conflicting.iter().map(|r| r.amount))
                .unwrap_or(Amount::from_units(u64::MAX));
            let found = DoubleSpendEvidence {
                voucher_id: voucher_id.to_string(),
                sender_id: sender_id.to_string(),
                previous_t_id: previous_t_id.to_string(),
                previous_balance: conflicting[0].previous_balance,
                conflicting_t_ids: conflicting.iter().map(|r| r.t_id.clone()).collect(),
                total_spent,
            };
            warn!(
                voucher_id = %found.voucher_id,
                sender = %found.sender_id,
                spends = found.conflicting_t_ids.len(),
                "double spend detected"
            );
            evidence.push(found);
        }
    }
    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Identity, PersonInfo};
    use crate::transaction::apply_transfer;
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

    #[test]
    fn replayed_snapshot_is_detected() {
        let (alice, _) = Identity::generate().unwrap();
        let (h1, _) = Identity::generate().unwrap();
        let (h2, _) = Identity::generate().unwrap();

        let mut voucher = finalized(&alice, 50);
        let mut snapshot = voucher.clone();

        apply_transfer(&mut voucher, &alice, h1.id(), whole(20)).unwrap();
        apply_transfer(&mut snapshot, &alice, h2.id(), whole(20)).unwrap();

        let found = find_conflicts([&voucher, &snapshot]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sender_id, alice.id());
        assert_eq!(found[0].previous_balance, whole(50));
        assert_eq!(found[0].conflicting_t_ids.len(), 2);
        assert_eq!(found[0].total_spent, whole(40));
        assert_eq!(found[0].overspent(), Amount::ZERO);
    }

    #[test]
    fn split_divergence_is_not_a_conflict() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let (carol, _) = Identity::generate().unwrap();

        let mut alice_copy = finalized(&alice, 50);
        apply_transfer(&mut alice_copy, &alice, bob.id(), whole(20)).unwrap();
        let mut bob_copy = alice_copy.clone();
        apply_transfer(&mut bob_copy, &bob, carol.id(), whole(20)).unwrap();
        apply_transfer(&mut alice_copy, &alice, carol.id(), whole(30)).unwrap();

        assert!(find_conflicts([&alice_copy, &bob_copy]).is_empty());
        // The same copy twice proves nothing either.
        assert!(find_conflicts([&alice_copy, &alice_copy.clone()]).is_empty());
    }
}
