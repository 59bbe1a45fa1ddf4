//! # Wallet Module
//!
//! Everything one holder does with many vouchers at once.
//!
//! ```text
//! lifecycle.rs   VoucherStatus and the classify function
//! collection.rs  VoucherCollection partitioned by status
//! payment.rs     send / receive of multi-voucher payments
//! audit.rs       offline double-spend detection across copies
//! ```
//!
//! The collection never talks to the disk. Callers (the storage session)
//! persist whatever an operation changed.

pub mod audit;
pub mod collection;
pub mod lifecycle;
pub mod payment;

pub use audit::{find_conflicts, DoubleSpendEvidence};
pub use collection::{TrashOutcome, VoucherCollection};
pub use lifecycle::{classify, derive_status, VoucherStatus};
pub use payment::{receive, send, PaymentError, UserTransaction};
