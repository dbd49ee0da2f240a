//! Result shapes returned to callers.
//!
//! Ledger integers are `U256`. Callers receive `u128` amounts; anything that
//! does not fit is reported as precision loss instead of being truncated.

use bstoken_shared::{Address, TransactionId};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, TokenError};
use crate::ledger::LedgerValue;

/// Result of an accepted mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Identifier of the accepted transaction.
    pub transaction_id: TransactionId,
}

/// Result of a balance or allowance query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountResult {
    /// Token amount in base units.
    pub amount: u128,
}

/// Result of a frozen-flag query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenResult {
    /// Whether the account is frozen.
    pub frozen: bool,
}

/// Result of an emergency-flag query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyResult {
    /// Whether the emergency stop is active.
    pub emergency: bool,
}

/// Result of an address query (owner, merchant, token logic contract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResult {
    /// The address stored on the ledger.
    pub value: Address,
}

/// Converts a ledger integer to a `u128` amount.
///
/// # Errors
///
/// Returns `PrecisionLoss` if the value exceeds `u128::MAX`.
pub fn to_amount(value: U256) -> Result<u128, TokenError> {
    if value > U256::from(u128::MAX) {
        return Err(TokenError::PrecisionLoss { value });
    }
    Ok(value.as_u128())
}

pub(crate) fn expect_bool(value: LedgerValue) -> Result<bool, LedgerError> {
    match value {
        LedgerValue::Bool(flag) => Ok(flag),
        other => Err(unexpected("bool", &other)),
    }
}

pub(crate) fn expect_uint(value: LedgerValue) -> Result<U256, LedgerError> {
    match value {
        LedgerValue::Uint(n) => Ok(n),
        other => Err(unexpected("uint", &other)),
    }
}

pub(crate) fn expect_address(value: LedgerValue) -> Result<Address, LedgerError> {
    match value {
        LedgerValue::Address(address) => Ok(address),
        other => Err(unexpected("address", &other)),
    }
}

fn unexpected(expected: &'static str, found: &LedgerValue) -> LedgerError {
    LedgerError::UnexpectedValue {
        expected,
        found: found.kind(),
    }
}
