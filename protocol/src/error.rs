//! # Error Categories
//!
//! Each module owns its error enum. They all sort into three buckets so a
//! shell can decide how to react without matching on every variant:
//!
//! - **Cryptographic**: a signature, chain or ciphertext failed to check
//!   out. Fatal to the operation, never retried.
//! - **State**: the request is not allowed right now (self-guarantee,
//!   insufficient funds, expired voucher...). The user can fix it.
//! - **Io**: the filesystem said no.

use std::fmt;

/// Coarse classification shared by every error type in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Cryptographic,
    State,
    Io,
}

impl ErrorCategory {
    /// Whether the user can resolve the failure by acting differently.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorCategory::State)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Cryptographic => write!(f, "cryptographic"),
            ErrorCategory::State => write!(f, "state"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_state_errors_are_recoverable() {
        assert!(ErrorCategory::State.is_recoverable());
        assert!(!ErrorCategory::Cryptographic.is_recoverable());
        assert!(!ErrorCategory::Io.is_recoverable());
    }
}
