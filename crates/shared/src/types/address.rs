//! Ledger account addresses.
//!
//! An address is `0x` followed by 40 hex digits. Addresses are stored
//! lower-cased so two spellings of the same account compare equal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const HEX_DIGITS: usize = 40;

/// Address parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The value does not start with `0x`.
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    /// The value does not have exactly 40 hex digits after the prefix.
    #[error("address must have {HEX_DIGITS} hex digits, got {0}")]
    InvalidLength(usize),

    /// The value contains a non-hex character.
    #[error("address contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// An account on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parses and normalizes an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a well-formed address.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(value.to_string()))?;

        if digits.len() != HEX_DIGITS {
            return Err(AddressError::InvalidLength(digits.len()));
        }

        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacter(bad));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// The all-zero address.
    #[must_use]
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(HEX_DIGITS)))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}
