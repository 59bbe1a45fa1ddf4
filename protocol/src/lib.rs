// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Minuto Protocol: Core Library
//!
//! Minuto is a complementary currency that works like paper vouchers: a
//! creator issues a voucher, guarantors co-sign it, and from then on it
//! changes hands by appending signed records to its own history. No ledger,
//! no consensus, no server. Whoever holds a voucher can check every step of
//! it offline.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519, X25519, AES-256-GCM, Argon2id, BIP-39, hashing.
//! - **identity**: Keypair from a recovery seed, `minuto1…` ids, person records.
//! - **voucher**: The voucher record, its signature protocol and verification.
//! - **transaction**: Signed transaction records and single-voucher transfers.
//! - **wallet**: Lifecycle status, the holder's collection, payments, audit.
//! - **storage**: Encrypted files, the profile and the unlocked session.
//! - **codec**: The one canonical encoder behind every signature and file.
//! - **config**: Protocol constants and the runtime store configuration.
//! - **error**: Error categories shared by every module's error type.
//!
//! ## Ground Rules
//!
//! 1. Amounts are fixed-point integers. No floating point near money.
//! 2. Nothing signed is ever mutated; verification notices if it was.
//! 3. Double spends are not prevented, only made provable: see
//!    [`wallet::audit`].

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod storage;
pub mod transaction;
pub mod voucher;
pub mod wallet;

pub use error::ErrorCategory;
pub use identity::{Identity, PersonInfo};
pub use storage::{ExchangePayload, Session};
pub use voucher::{Amount, Voucher, VoucherDraft};
pub use wallet::{VoucherCollection, VoucherStatus};
