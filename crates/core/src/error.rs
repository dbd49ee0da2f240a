//! Error types for token operations.
//!
//! This module defines every failure a caller of the token service can see:
//! guard failures detected before dispatch, unlock failures, ledger query
//! and submission failures, and precision loss while normalizing results.

use bstoken_shared::Address;
use primitive_types::U256;
use thiserror::Error;

use crate::dispatcher::DispatchStage;

/// A precondition that failed before anything was submitted.
///
/// The messages are kept verbatim for compatibility with existing callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardFailure {
    /// The ledger's emergency stop is active.
    #[error("This contract has been cautiously stopped")]
    ContractStopped,

    /// The source account is frozen.
    #[error("{account} address has been cautiously frozen")]
    AccountFrozen {
        /// The frozen account.
        account: Address,
    },

    /// The source account balance is below the requested amount.
    #[error("{account} address has not enough funds")]
    InsufficientFunds {
        /// The underfunded account.
        account: Address,
    },

    /// The spender's allowance is below the requested amount.
    #[error("Spender {spender} has not enough allowance funds")]
    InsufficientAllowance {
        /// The spender acting on the owner's behalf.
        spender: Address,
    },
}

impl GuardFailure {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ContractStopped => "CONTRACT_STOPPED",
            Self::AccountFrozen { .. } => "ACCOUNT_FROZEN",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
        }
    }
}

/// Errors reported by a ledger client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger refused the call (revert, unauthorized signer, locked account).
    #[error("{reason}")]
    Rejected {
        /// Reason given by the ledger.
        reason: String,
    },

    /// The ledger could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger answered with a value of the wrong shape.
    #[error("expected {expected} value, got {found}")]
    UnexpectedValue {
        /// The value kind the query should produce.
        expected: &'static str,
        /// The value kind actually returned.
        found: &'static str,
    },

    /// The event subscription ended.
    #[error("event subscription closed")]
    SubscriptionClosed,
}

impl LedgerError {
    /// Create a rejection error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Errors reported by the account unlock service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnlockError {
    /// The credential does not unlock the account.
    #[error("could not unlock account {account}: invalid credential")]
    InvalidCredential {
        /// The account that stayed locked.
        account: Address,
    },

    /// The unlock service could not be reached.
    #[error("unlock service unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to callers of the token service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// A precondition failed; nothing was submitted.
    #[error(transparent)]
    Guard(#[from] GuardFailure),

    /// The signer could not be unlocked; nothing was submitted.
    #[error(transparent)]
    Unlock(#[from] UnlockError),

    /// A read against the ledger failed.
    #[error("Ledger query failed: {0}")]
    Query(LedgerError),

    /// The ledger rejected or failed a submitted transaction.
    #[error("Transaction rejected: {0}")]
    Submission(LedgerError),

    /// A ledger integer does not fit the result representation.
    #[error("Ledger value {value} cannot be represented without precision loss")]
    PrecisionLoss {
        /// The value as reported by the ledger.
        value: U256,
    },
}

impl TokenError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Guard(failure) => failure.error_code(),
            Self::Unlock(_) => "UNLOCK_FAILED",
            Self::Query(_) => "LEDGER_QUERY_FAILED",
            Self::Submission(_) => "SUBMISSION_FAILED",
            Self::PrecisionLoss { .. } => "PRECISION_LOSS",
        }
    }

    /// Returns the dispatch stage in which this error arises.
    #[must_use]
    pub fn stage(&self) -> DispatchStage {
        match self {
            Self::Guard(_) | Self::Query(_) => DispatchStage::Validating,
            Self::Unlock(_) => DispatchStage::Unlocking,
            Self::Submission(_) => DispatchStage::Submitting,
            Self::PrecisionLoss { .. } => DispatchStage::Resolved,
        }
    }

    /// Returns the guard failure, if this is one.
    #[must_use]
    pub fn as_guard(&self) -> Option<&GuardFailure> {
        match self {
            Self::Guard(failure) => Some(failure),
            _ => None,
        }
    }
}
