//! Transaction records: one signed step in a voucher's balance history.
//!
//! A record moves `amount` from the sender's fragment of the voucher to the
//! recipient. Afterwards two fragments exist: the recipient holds `amount`
//! and the sender keeps `new_balance = previous_balance - amount`. Each
//! fragment can only be spent once, by a later record naming its holder
//! as sender and this record's `t_id` as `previous_t_id`.
//!
//! # Canonical Byte Format
//!
//! [`TransactionRecord::signable_bytes`] concatenates, in order: voucher
//! id, previous t_id (empty for the initial record), sender, recipient
//! (each NUL-terminated), then amount, previous balance, new balance and
//! timestamp as little-endian `u64`s. `t_id` is the hex double-SHA-256 of
//! those bytes, so every record commits to its predecessor.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::double_sha256;
use crate::identity::Identity;
use crate::voucher::Amount;

/// One entry of a voucher's append-only transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// `hex(double_sha256(signable_bytes))`.
    pub t_id: String,

    /// Lineage id of the voucher this record belongs to.
    pub voucher_id: String,

    /// `t_id` of the record whose fragment this one spends. `None` only for
    /// the initial creator-to-creator record.
    pub previous_t_id: Option<String>,

    pub sender_id: String,
    pub recipient_id: String,

    /// Amount moved to the recipient.
    pub amount: Amount,

    /// Sender's balance before this step.
    pub previous_balance: Amount,

    /// Sender's remainder after this step.
    pub new_balance: Amount,

    /// Unix timestamp in milliseconds.
    pub timestamp: u64,

    /// Ed25519 signature of the sender over the signable bytes, hex-encoded.
    pub sender_signature: String,
}

impl TransactionRecord {
    /// Unsigned record with its `t_id` already computed. Call
    /// [`sign`](Self::sign) before appending it anywhere.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn unsigned(
        voucher_id: &str,
        previous_t_id: Option<String>,
        sender_id: &str,
        recipient_id: &str,
        amount: Amount,
        previous_balance: Amount,
        new_balance: Amount,
        timestamp: u64,
    ) -> Self {
        let mut record = Self {
            t_id: String::new(),
            voucher_id: voucher_id.to_string(),
            previous_t_id,
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            amount,
            previous_balance,
            new_balance,
            timestamp,
            sender_signature: String::new(),
        };
        record.t_id = record.compute_id();
        record
    }

    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.extend_from_slice(self.voucher_id.as_bytes());
        buf.push(0x00);

        if let Some(ref prev) = self.previous_t_id {
            buf.extend_from_slice(prev.as_bytes());
        }
        buf.push(0x00);

        buf.extend_from_slice(self.sender_id.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(self.recipient_id.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&self.amount.units().to_le_bytes());
        buf.extend_from_slice(&self.previous_balance.units().to_le_bytes());
        buf.extend_from_slice(&self.new_balance.units().to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());

        buf
    }

    pub fn compute_id(&self) -> String {
        hex::encode(double_sha256(&self.signable_bytes()))
    }

    /// Sign in place. The caller must be the record's sender; anything else
    /// fails verification later.
    pub fn sign(&mut self, sender: &Identity) {
        self.sender_signature = sender.sign(&self.signable_bytes()).to_hex();
    }

    pub fn verify_signature(&self) -> bool {
        Identity::verify_hex(
            &self.sender_id,
            &self.signable_bytes(),
            &self.sender_signature,
        )
    }

    pub fn is_initial(&self) -> bool {
        self.previous_t_id.is_none()
    }

    pub fn involves(&self, party_id: &str) -> bool {
        self.sender_id == party_id || self.recipient_id == party_id
    }

    /// The fragment this record leaves with `party_id`: the remainder for
    /// the sender (also on the initial self-record), the transferred amount
    /// for the recipient, nothing for anyone else.
    pub fn balance_of(&self, party_id: &str) -> Amount {
        if self.sender_id == party_id {
            self.new_balance
        } else if self.recipient_id == party_id {
            self.amount
        } else {
            Amount::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(identity: &Identity) -> TransactionRecord {
        let mut record = TransactionRecord::unsigned(
            "voucher-1",
            Some("prev".into()),
            identity.id(),
            "minuto1recipient",
            Amount::from_whole(20).unwrap(),
            Amount::from_whole(50).unwrap(),
            Amount::from_whole(30).unwrap(),
            1_700_000_000_000,
        );
        record.sign(identity);
        record
    }

    #[test]
    fn signed_record_verifies() {
        let (alice, _) = Identity::generate().unwrap();
        let record = sample(&alice);
        assert!(record.verify_signature());
        assert_eq!(record.t_id, record.compute_id());
        assert_eq!(record.t_id.len(), 64);
    }

    #[test]
    fn any_field_change_changes_id_and_breaks_signature() {
        let (alice, _) = Identity::generate().unwrap();
        let record = sample(&alice);

        let mut tampered = record.clone();
        tampered.amount = Amount::from_whole(21).unwrap();
        assert_ne!(tampered.compute_id(), record.t_id);
        assert!(!tampered.verify_signature());

        let mut relinked = record.clone();
        relinked.previous_t_id = None;
        assert_ne!(relinked.compute_id(), record.t_id);
        assert!(!relinked.verify_signature());
    }

    #[test]
    fn balance_of_each_party() {
        let (alice, _) = Identity::generate().unwrap();
        let record = sample(&alice);
        assert_eq!(record.balance_of(alice.id()), Amount::from_whole(30).unwrap());
        assert_eq!(
            record.balance_of("minuto1recipient"),
            Amount::from_whole(20).unwrap()
        );
        assert_eq!(record.balance_of("minuto1stranger"), Amount::ZERO);
        assert!(!record.is_initial());
    }
}
