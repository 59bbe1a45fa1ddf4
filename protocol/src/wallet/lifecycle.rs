//! Voucher lifecycle status.
//!
//! ```text
//!  UNFINISHED ──(creator signs)──▶ OWN / OTHER ──(balance spent)──▶ USED
//!                                       │
//!                           holder action: ARCHIVED / TRASHED
//! ```
//!
//! Four states follow from content alone ([`derive_status`]). `Archived`
//! and `Trashed` are holder decisions recorded in the voucher's local
//! state and override the derived one ([`classify`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::voucher::Voucher;

/// Holder-relative classification of a voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Unfinished,
    Own,
    Other,
    Used,
    Archived,
    Trashed,
}

impl VoucherStatus {
    pub const ALL: [VoucherStatus; 6] = [
        VoucherStatus::Unfinished,
        VoucherStatus::Own,
        VoucherStatus::Other,
        VoucherStatus::Used,
        VoucherStatus::Archived,
        VoucherStatus::Trashed,
    ];

    /// Subfolder of the data root holding vouchers in this status.
    pub fn folder_name(self) -> &'static str {
        match self {
            VoucherStatus::Unfinished => "unfinished",
            VoucherStatus::Own => "own",
            VoucherStatus::Other => "other",
            VoucherStatus::Used => "used",
            VoucherStatus::Archived => "archived",
            VoucherStatus::Trashed => "trashed",
        }
    }

    /// Whether vouchers in this status can pay.
    pub fn is_spendable(self) -> bool {
        matches!(self, VoucherStatus::Own | VoucherStatus::Other)
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

impl FromStr for VoucherStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoucherStatus::ALL
            .into_iter()
            .find(|status| status.folder_name() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown voucher status '{s}'"))
    }
}

/// Status implied by content alone, ignoring holder overrides.
pub fn derive_status(voucher: &Voucher, holder_id: &str) -> VoucherStatus {
    if !voucher.is_finalized() {
        return VoucherStatus::Unfinished;
    }
    if voucher.amount_available_to(holder_id).is_zero() {
        return VoucherStatus::Used;
    }
    if voucher.creator_id() == holder_id {
        VoucherStatus::Own
    } else {
        VoucherStatus::Other
    }
}

/// The partition a voucher belongs in for `holder_id`.
///
/// A trashed voucher stays trashed and an archived one stays archived until
/// the holder restores it; everything else is [`derive_status`].
pub fn classify(voucher: &Voucher, holder_id: &str) -> VoucherStatus {
    if voucher.local.trashed {
        VoucherStatus::Trashed
    } else if voucher.local.archived {
        VoucherStatus::Archived
    } else {
        derive_status(voucher, holder_id)
    }
}
