//! Fixed-point Minuto amounts.
//!
//! `Amount` counts hundredths of a Minuto in a `u64`. No floating point
//! anywhere near monetary values: every split has to add up to the face
//! value exactly, forever.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{AMOUNT_DECIMALS, AMOUNT_SCALE, CURRENCY_UNIT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount '{0}'")]
    Invalid(String),

    #[error("amount '{0}' has more than {AMOUNT_DECIMALS} decimal places")]
    TooPrecise(String),

    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

/// A quantity of Minuto in smallest units (1/100).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// From smallest units: `Amount::from_units(2050)` is 20.50 M.
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// From whole Minuto. `None` on overflow.
    pub fn from_whole(whole: u64) -> Option<Self> {
        whole.checked_mul(AMOUNT_SCALE).map(Self)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Sum that refuses to overflow.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Option<Amount> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }

    /// "20.50 M".
    pub fn display_with_unit(self) -> String {
        format!("{self} {CURRENCY_UNIT}")
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0>width$}",
            self.0 / AMOUNT_SCALE,
            self.0 % AMOUNT_SCALE,
            width = AMOUNT_DECIMALS as usize
        )
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Accepts `"20"`, `"20.5"`, `"20.50"` and a comma as decimal separator
    /// (`"20,50"`), the way amounts are written on the paper vouchers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountParseError::Empty);
        }
        let normalized = trimmed.replace(',', ".");
        let (whole, frac) = match normalized.split_once('.') {
            Some((w, f)) => (w, f),
            None => (normalized.as_str(), ""),
        };
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }

        let whole: u64 = whole
            .parse()
            .map_err(|_| AmountParseError::Overflow(s.to_string()))?;
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS as usize);
            padded
                .parse()
                .map_err(|_| AmountParseError::Invalid(s.to_string()))?
        };

        whole
            .checked_mul(AMOUNT_SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(|| AmountParseError::Overflow(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        assert_eq!("20".parse::<Amount>().unwrap(), Amount::from_units(2000));
        assert_eq!("20.5".parse::<Amount>().unwrap(), Amount::from_units(2050));
        assert_eq!("0,05".parse::<Amount>().unwrap(), Amount::from_units(5));
        assert_eq!(Amount::from_units(2050).to_string(), "20.50");
        assert_eq!(Amount::from_units(7).display_with_unit(), "0.07 M");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("".parse::<Amount>(), Err(AmountParseError::Empty));
        assert!(matches!("-3".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
        assert!(matches!(".5".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
        assert!(matches!(
            "1.234".parse::<Amount>(),
            Err(AmountParseError::TooPrecise(_))
        ));
        assert!(matches!(
            "999999999999999999999".parse::<Amount>(),
            Err(AmountParseError::Overflow(_))
        ));
    }

    #[test]
    fn checked_arithmetic() {
        let fifty = Amount::from_whole(50).unwrap();
        let twenty = Amount::from_whole(20).unwrap();
        assert_eq!(fifty.checked_sub(twenty), Amount::from_whole(30));
        assert_eq!(twenty.checked_sub(fifty), None);
        assert_eq!(Amount::from_units(u64::MAX).checked_add(Amount::from_units(1)), None);
        assert_eq!(
            Amount::checked_sum([twenty, twenty, Amount::from_units(1)]),
            Some(Amount::from_units(4001))
        );
    }

    #[test]
    fn serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&Amount::from_units(5000)).unwrap(), "5000");
    }
}
