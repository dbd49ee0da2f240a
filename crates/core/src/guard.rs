//! Precondition checks run before a mutating call is dispatched.
//!
//! Every guard is an independent read. The reads for one request are issued
//! concurrently and joined; the first failure is then picked in a fixed
//! priority order (emergency, frozen, allowance, balance) so the reported
//! error never depends on which read completed first.

use bstoken_shared::Address;
use primitive_types::U256;

use crate::error::{GuardFailure, TokenError};
use crate::ledger::{ContractCall, LedgerClient, LedgerQuery};
use crate::normalize::{expect_bool, expect_uint};

/// The guards that apply to one mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPlan {
    /// Account whose frozen flag and balance are checked.
    pub source: Address,
    /// Amount the source must cover.
    pub amount: U256,
    /// Spender whose allowance from `source` must cover `amount`.
    pub spender: Option<Address>,
}

impl GuardPlan {
    /// Derives the guards for `call` signed by `signer`.
    ///
    /// Administrative calls have no guards and yield `None`. For delegated
    /// transfers the token owner is the source and the signer is the spender;
    /// the spender's own frozen flag is left to the ledger.
    #[must_use]
    pub fn for_call(signer: &Address, call: &ContractCall) -> Option<Self> {
        match call {
            ContractCall::Transfer { amount, .. }
            | ContractCall::Approve { amount, .. }
            | ContractCall::ApproveAndCall { amount, .. }
            | ContractCall::CashOut { amount, .. } => Some(Self {
                source: signer.clone(),
                amount: *amount,
                spender: None,
            }),
            ContractCall::TransferFrom { from, amount, .. } => Some(Self {
                source: from.clone(),
                amount: *amount,
                spender: Some(signer.clone()),
            }),
            ContractCall::StartEmergency
            | ContractCall::StopEmergency
            | ContractCall::FreezeAccount { .. }
            | ContractCall::SetBsToken(_)
            | ContractCall::SetMerchant(_)
            | ContractCall::TransferOwnership(_) => None,
        }
    }
}

/// Runs every guard in `plan` against the ledger.
///
/// # Errors
///
/// Returns the highest-priority failure: a guard failure, or a query error
/// from the guard that would have been checked at that position.
pub async fn evaluate(ledger: &dyn LedgerClient, plan: &GuardPlan) -> Result<(), TokenError> {
    let allowance = async {
        match &plan.spender {
            Some(spender) => check_allowance(ledger, &plan.source, spender, plan.amount).await,
            None => Ok(()),
        }
    };

    let (emergency, frozen, allowance, balance) = futures::join!(
        check_emergency(ledger),
        check_frozen(ledger, &plan.source),
        allowance,
        check_balance(ledger, &plan.source, plan.amount),
    );

    emergency?;
    frozen?;
    allowance?;
    balance
}

async fn check_emergency(ledger: &dyn LedgerClient) -> Result<(), TokenError> {
    let stopped = ledger
        .query(LedgerQuery::Emergency)
        .await
        .and_then(expect_bool)
        .map_err(TokenError::Query)?;

    if stopped {
        return Err(GuardFailure::ContractStopped.into());
    }
    Ok(())
}

async fn check_frozen(ledger: &dyn LedgerClient, account: &Address) -> Result<(), TokenError> {
    let frozen = ledger
        .query(LedgerQuery::FrozenAccount(account.clone()))
        .await
        .and_then(expect_bool)
        .map_err(TokenError::Query)?;

    if frozen {
        return Err(GuardFailure::AccountFrozen {
            account: account.clone(),
        }
        .into());
    }
    Ok(())
}

async fn check_allowance(
    ledger: &dyn LedgerClient,
    owner: &Address,
    spender: &Address,
    required: U256,
) -> Result<(), TokenError> {
    let allowance = ledger
        .query(LedgerQuery::Allowance {
            owner: owner.clone(),
            spender: spender.clone(),
        })
        .await
        .and_then(expect_uint)
        .map_err(TokenError::Query)?;

    if allowance < required {
        return Err(GuardFailure::InsufficientAllowance {
            spender: spender.clone(),
        }
        .into());
    }
    Ok(())
}

async fn check_balance(
    ledger: &dyn LedgerClient,
    account: &Address,
    required: U256,
) -> Result<(), TokenError> {
    let balance = ledger
        .query(LedgerQuery::BalanceOf(account.clone()))
        .await
        .and_then(expect_uint)
        .map_err(TokenError::Query)?;

    if balance < required {
        return Err(GuardFailure::InsufficientFunds {
            account: account.clone(),
        }
        .into());
    }
    Ok(())
}
