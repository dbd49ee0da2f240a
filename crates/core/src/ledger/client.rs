//! The ledger client contract.
//!
//! The token contract itself lives on the ledger. This module only describes
//! how it is reached: typed reads, typed mutating calls, and an event feed.

use async_trait::async_trait;
use bstoken_shared::{Address, TransactionId};
use futures::stream::BoxStream;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A read-only query against the token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerQuery {
    /// Global emergency-stop flag.
    Emergency,
    /// Frozen flag of one account.
    FrozenAccount(Address),
    /// Balance of one account.
    BalanceOf(Address),
    /// Amount `spender` may move out of `owner`'s balance.
    Allowance {
        /// Account holding the tokens.
        owner: Address,
        /// Account allowed to spend them.
        spender: Address,
    },
    /// Contract owner.
    Owner,
    /// Merchant account allowed to run administrative controls.
    Merchant,
    /// Token logic contract the frontend forwards to.
    BsToken,
}

impl LedgerQuery {
    /// Contract method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::FrozenAccount(_) => "frozenAccount",
            Self::BalanceOf(_) => "balanceOf",
            Self::Allowance { .. } => "allowance",
            Self::Owner => "owner",
            Self::Merchant => "merchant",
            Self::BsToken => "bsToken",
        }
    }
}

/// A value returned by a ledger query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerValue {
    /// Boolean flag.
    Bool(bool),
    /// Unsigned ledger integer.
    Uint(U256),
    /// Account address.
    Address(Address),
}

impl LedgerValue {
    /// Name of the value kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Uint(_) => "uint",
            Self::Address(_) => "address",
        }
    }
}

/// A mutating call against the token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// Move `amount` from the signer to `to`.
    Transfer {
        /// Recipient.
        to: Address,
        /// Amount to move.
        amount: U256,
    },
    /// Allow `spender` to move up to `amount` of the signer's balance.
    Approve {
        /// Account receiving the allowance.
        spender: Address,
        /// Allowance ceiling.
        amount: U256,
    },
    /// Approve `spender` and notify it in the same transaction.
    ApproveAndCall {
        /// Contract receiving the allowance and the callback.
        spender: Address,
        /// Beneficiary passed through to the callback.
        to: Address,
        /// Opaque identifier passed through to the callback.
        id: U256,
        /// Allowance ceiling.
        amount: U256,
    },
    /// Move `amount` from `from` to `to` using the signer's allowance.
    TransferFrom {
        /// Account the tokens are taken from.
        from: Address,
        /// Recipient.
        to: Address,
        /// Amount to move.
        amount: U256,
    },
    /// Burn `amount` of the signer's balance against a bank transfer.
    CashOut {
        /// Amount to cash out.
        amount: U256,
        /// Destination bank account.
        bank_account: String,
    },
    /// Raise the emergency stop.
    StartEmergency,
    /// Lower the emergency stop.
    StopEmergency,
    /// Set or clear the frozen flag of `target`.
    FreezeAccount {
        /// Account to update.
        target: Address,
        /// New frozen flag.
        freeze: bool,
    },
    /// Point the frontend at a new token logic contract.
    SetBsToken(Address),
    /// Replace the merchant account.
    SetMerchant(Address),
    /// Hand contract ownership to another account.
    TransferOwnership(Address),
}

impl ContractCall {
    /// Contract method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Approve { .. } => "approve",
            Self::ApproveAndCall { .. } => "approveAndCall",
            Self::TransferFrom { .. } => "transferFrom",
            Self::CashOut { .. } => "cashOut",
            Self::StartEmergency => "startEmergency",
            Self::StopEmergency => "stopEmergency",
            Self::FreezeAccount { .. } => "freezeAccount",
            Self::SetBsToken(_) => "setBSToken",
            Self::SetMerchant(_) => "setMerchant",
            Self::TransferOwnership(_) => "transferOwnership",
        }
    }
}

/// Options attached to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Signing account.
    pub from: Address,
    /// Resource ceiling for the transaction.
    pub gas_limit: u64,
}

/// Which events a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Cash-out requests.
    CashOut,
}

/// Arguments of a cash-out event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashOutArgs {
    /// Account that cashed out.
    pub account: Address,
    /// Amount burned.
    pub amount: U256,
    /// Destination bank account.
    pub bank_account: String,
}

/// An event emitted by the token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    /// A cash-out was accepted.
    CashOut {
        /// Event arguments.
        args: CashOutArgs,
    },
}

/// Stream of ledger events.
pub type EventStream = BoxStream<'static, LedgerEvent>;

/// Typed proxy to the token contract on the ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Run a read-only query.
    async fn query(&self, query: LedgerQuery) -> Result<LedgerValue, LedgerError>;

    /// Submit a mutating call signed by `options.from`.
    async fn submit(
        &self,
        call: ContractCall,
        options: SubmitOptions,
    ) -> Result<TransactionId, LedgerError>;

    /// Subscribe to contract events.
    async fn subscribe(&self, filter: EventFilter) -> Result<EventStream, LedgerError>;
}
