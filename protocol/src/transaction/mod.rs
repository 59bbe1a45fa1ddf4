//! # Transaction Module
//!
//! Value moves between Minuto holders by appending signed records to a
//! voucher's own history. There is no ledger: the voucher carries its
//! complete chain and anyone holding it can check every step offline.
//!
//! ```text
//! record.rs  TransactionRecord, canonical bytes, t_id, signatures
//! engine.rs  apply_transfer: checks and appends one spend
//! ```
//!
//! ## Transfer Lifecycle
//!
//! 1. **Check**: finalized, not expired, sender holds a fragment, amount fits.
//! 2. **Verify**: the full voucher verifies before anything is appended.
//! 3. **Append**: the sender signs a record spending their fragment.
//!
//! The sender keeps the mutated copy (their remainder); the recipient gets
//! a clone of the same voucher (the transferred fragment).

pub mod engine;
pub mod record;

use thiserror::Error;

use crate::error::ErrorCategory;
use crate::voucher::{Amount, VoucherError};

pub use engine::apply_transfer;
pub use record::TransactionRecord;

/// Errors from a single transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("amount must be > 0")]
    ZeroAmount,

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("voucher is not finalized")]
    VoucherNotFinalized,

    #[error("voucher expired at {validity}")]
    VoucherExpired { validity: u64 },

    #[error("{sender_id} does not hold this voucher")]
    NotCurrentHolder { sender_id: String },

    #[error("sender and recipient must differ")]
    SelfTransfer,

    #[error("invalid recipient id: {0}")]
    InvalidRecipient(String),

    #[error(transparent)]
    Voucher(#[from] VoucherError),
}

impl TransferError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransferError::Voucher(e) => e.category(),
            TransferError::InvalidRecipient(_) => ErrorCategory::Cryptographic,
            TransferError::ZeroAmount
            | TransferError::InsufficientBalance { .. }
            | TransferError::VoucherNotFinalized
            | TransferError::VoucherExpired { .. }
            | TransferError::NotCurrentHolder { .. }
            | TransferError::SelfTransfer => ErrorCategory::State,
        }
    }
}
