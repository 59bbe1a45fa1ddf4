//! # Voucher Module
//!
//! The signed, append-only value record at the center of Minuto.
//!
//! ```text
//! amount.rs        Fixed-point Amount (hundredths of a Minuto)
//! model.rs         Voucher, CreationBlock, guarantor entries, canonical payloads
//! signing.rs       Guarantor and creator signing, merging returned signatures
//! verification.rs  Signature and transaction-chain verification
//! ```
//!
//! ## Signature Protocol
//!
//! ```text
//! CREATED ──(guarantor signs)──▶ GUARANTOR_SIGNED ──(creator signs)──▶ FINALIZED
//!                                   ▲          │
//!                                   └──────────┘ more guarantors
//! ```
//!
//! 1. The creator fills in a [`VoucherDraft`] and calls [`Voucher::create`].
//! 2. Guarantors (never the creator) sign creation payload ‖ their info.
//! 3. The creator signs creation payload ‖ all guarantor entries. This also
//!    appends the initial creator-to-creator transaction record.
//!
//! Nothing signed may change afterwards; [`verify_voucher`] notices if it does.

pub mod amount;
pub mod model;
pub mod signing;
pub mod verification;

use thiserror::Error;

use crate::codec::CodecError;
use crate::error::ErrorCategory;

pub use amount::{Amount, AmountParseError};
pub use model::{
    end_of_year_millis, now_millis, CreationBlock, GuarantorSignature, GuarantorSignatureBundle,
    LocalState, SignatureState, Voucher, VoucherDraft,
};
pub use signing::{merge_guarantor_signatures, sign_as_creator, sign_as_guarantor};
pub use verification::{
    verify_creator_signature, verify_guarantor_signatures, verify_transaction_chain,
    verify_voucher,
};

/// Errors from the voucher signature protocol and from verification.
#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("a guarantor cannot be the creator of the voucher")]
    SelfGuarantor,

    #[error("voucher is already finalized")]
    AlreadyFinalized,

    #[error("only the creator {creator_id} may sign this voucher as creator")]
    ForeignVoucher { creator_id: String },

    #[error("voucher has no guarantor signature")]
    NoGuarantor,

    #[error("{guarantor_id} has already guaranteed this voucher")]
    DuplicateGuarantor { guarantor_id: String },

    #[error("signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    #[error("signatures are for voucher {got}, expected {expected}")]
    VoucherMismatch { expected: String, got: String },

    #[error("invalid voucher draft: {0}")]
    InvalidDraft(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl VoucherError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        VoucherError::SignatureInvalid {
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            VoucherError::SignatureInvalid { .. } | VoucherError::VoucherMismatch { .. } => {
                ErrorCategory::Cryptographic
            }
            VoucherError::Codec(e) => e.category(),
            VoucherError::SelfGuarantor
            | VoucherError::AlreadyFinalized
            | VoucherError::ForeignVoucher { .. }
            | VoucherError::NoGuarantor
            | VoucherError::DuplicateGuarantor { .. }
            | VoucherError::InvalidDraft(_) => ErrorCategory::State,
        }
    }
}
