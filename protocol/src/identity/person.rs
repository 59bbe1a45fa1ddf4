//! # Person Records
//!
//! Contact details a party attaches to what they sign: the creator's block
//! on every voucher they issue, and each guarantor's attestation. These are
//! fixed structs, not free-form maps, because their canonical encoding is
//! part of a signed payload and a missing or extra key would break every
//! signature over it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Self-declared gender, as printed on paper vouchers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unknown,
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Unknown => write!(f, "unknown"),
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// A party's contact card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonInfo {
    pub first_name: String,
    pub last_name: String,
    pub organization: String,
    pub street: String,
    pub zip_code: String,
    pub city: String,
    pub state_or_region: String,
    pub country: String,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    /// What the party offers in exchange for Minuto (free text).
    pub service_offer: String,
    /// Free-form location, e.g. "52.52,13.40".
    pub coordinates: String,
}

impl PersonInfo {
    /// Minimal card with just a name. Handy for tests and quick setups.
    pub fn named(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// "First Last", or the organization when both names are empty.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.organization.clone()
        } else {
            name.to_string()
        }
    }

    /// One-line postal address; empty parts are skipped.
    pub fn address(&self) -> String {
        let locality = format!("{} {}", self.zip_code, self.city);
        [
            self.street.as_str(),
            locality.trim(),
            self.state_or_region.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// What a guarantor signs alongside the voucher's creation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuarantorInfo {
    /// Minuto ID of the guarantor; the key in it verifies the signature.
    pub id: String,
    pub name: String,
    pub address: String,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub coordinates: String,
    /// Unix milliseconds at which the guarantor signed.
    pub signature_time: u64,
}

impl GuarantorInfo {
    pub fn from_person(id: impl Into<String>, person: &PersonInfo, signature_time: u64) -> Self {
        Self {
            id: id.into(),
            name: person.display_name(),
            address: person.address(),
            gender: person.gender,
            email: person.email.clone(),
            phone: person.phone.clone(),
            coordinates: person.coordinates.clone(),
            signature_time,
        }
    }
}
