//! In-memory ledger backed by a `Mutex`-guarded state table.
//!
//! Stands in for the on-chain token contract in tests and local runs. It
//! applies the contract's own rules (signer must be unlocked, controls are
//! owner/merchant only, stopped and frozen accounts revert) so that the
//! client-side guards can be checked against a ledger that would also refuse.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bstoken_shared::{Address, Credential, TransactionId};
use futures::stream;
use primitive_types::U256;
use tokio::sync::broadcast;

use super::client::{
    CashOutArgs, ContractCall, EventFilter, EventStream, LedgerClient, LedgerEvent, LedgerQuery,
    LedgerValue, SubmitOptions,
};
use crate::error::{LedgerError, UnlockError};
use crate::unlock::AccountUnlocker;

const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct LedgerState {
    balances: HashMap<Address, U256>,
    /// (owner, spender) -> allowance.
    allowances: HashMap<(Address, Address), U256>,
    frozen: HashSet<Address>,
    emergency: bool,
    owner: Address,
    merchant: Address,
    bs_token: Address,
    passwords: HashMap<Address, Credential>,
    unlocked: HashSet<Address>,
    next_tx: u64,
}

impl LedgerState {
    fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn require_running(&self) -> Result<(), LedgerError> {
        if self.emergency {
            return Err(LedgerError::rejected("contract is stopped"));
        }
        Ok(())
    }

    fn require_not_frozen(&self, account: &Address) -> Result<(), LedgerError> {
        if self.frozen.contains(account) {
            return Err(LedgerError::rejected(format!("account {account} is frozen")));
        }
        Ok(())
    }

    fn require_controller(&self, signer: &Address) -> Result<(), LedgerError> {
        if *signer != self.owner && *signer != self.merchant {
            return Err(LedgerError::rejected(format!("{signer} is not authorized")));
        }
        Ok(())
    }

    fn require_owner(&self, signer: &Address) -> Result<(), LedgerError> {
        if *signer != self.owner {
            return Err(LedgerError::rejected(format!("{signer} is not the owner")));
        }
        Ok(())
    }

    fn debit(&mut self, account: &Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.balance(account);
        if balance < amount {
            return Err(LedgerError::rejected(format!(
                "insufficient balance for {account}"
            )));
        }
        self.balances.insert(account.clone(), balance - amount);
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self
            .balance(account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::rejected("balance overflow"))?;
        self.balances.insert(account.clone(), balance);
        Ok(())
    }

    /// Moves `amount` between accounts. Both balances are computed before
    /// either is written, so a rejected move leaves state untouched.
    fn move_funds(&mut self, from: &Address, to: &Address, amount: U256) -> Result<(), LedgerError> {
        let from_balance = self.balance(from).checked_sub(amount).ok_or_else(|| {
            LedgerError::rejected(format!("insufficient balance for {from}"))
        })?;
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::rejected("balance overflow"))?;

        self.balances.insert(from.clone(), from_balance);
        self.balances.insert(to.clone(), to_balance);
        Ok(())
    }

    fn next_transaction_id(&mut self) -> TransactionId {
        self.next_tx += 1;
        TransactionId::new(format!("0x{:064x}", self.next_tx))
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

/// In-memory token contract.
///
/// Accounts must be registered with a password before they can be unlocked,
/// and must be unlocked before they can sign.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
    submissions: AtomicUsize,
}

impl InMemoryLedger {
    /// Creates a ledger controlled by `owner` and `merchant`.
    #[must_use]
    pub fn new(owner: Address, merchant: Address) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(LedgerState {
                balances: HashMap::new(),
                allowances: HashMap::new(),
                frozen: HashSet::new(),
                emergency: false,
                owner,
                merchant,
                bs_token: Address::zero(),
                passwords: HashMap::new(),
                unlocked: HashSet::new(),
                next_tx: 0,
            }),
            events,
            submissions: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an account and the password that unlocks it.
    pub fn register_account(&self, account: Address, credential: Credential) {
        self.state().passwords.insert(account, credential);
    }

    /// Credits `amount` to `account` from the banking rail.
    ///
    /// # Errors
    ///
    /// Returns an error if the balance would overflow.
    pub fn cash_in(&self, account: &Address, amount: impl Into<U256>) -> Result<(), LedgerError> {
        self.state().credit(account, amount.into())
    }

    /// Locks every account again, as if the unlock window elapsed.
    pub fn lock_all(&self) {
        self.state().unlocked.clear();
    }

    /// Number of `submit` calls received, accepted or not.
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn apply(&self, call: ContractCall, signer: &Address) -> Result<TransactionId, LedgerError> {
        let mut state = self.state();

        if !state.unlocked.contains(signer) {
            return Err(LedgerError::rejected(format!("account {signer} is locked")));
        }

        let mut event = None;

        match call {
            ContractCall::Transfer { to, amount } => {
                state.require_running()?;
                state.require_not_frozen(signer)?;
                state.require_not_frozen(&to)?;
                state.move_funds(signer, &to, amount)?;
            }
            ContractCall::Approve { spender, amount }
            | ContractCall::ApproveAndCall {
                spender, amount, ..
            } => {
                state.require_running()?;
                state.require_not_frozen(signer)?;
                state.allowances.insert((signer.clone(), spender), amount);
            }
            ContractCall::TransferFrom { from, to, amount } => {
                state.require_running()?;
                state.require_not_frozen(&from)?;
                state.require_not_frozen(&to)?;
                let allowance = state.allowance(&from, signer);
                if allowance < amount {
                    return Err(LedgerError::rejected("allowance exceeded"));
                }
                state.move_funds(&from, &to, amount)?;
                state
                    .allowances
                    .insert((from, signer.clone()), allowance - amount);
            }
            ContractCall::CashOut {
                amount,
                bank_account,
            } => {
                state.require_running()?;
                state.require_not_frozen(signer)?;
                state.debit(signer, amount)?;
                event = Some(LedgerEvent::CashOut {
                    args: CashOutArgs {
                        account: signer.clone(),
                        amount,
                        bank_account,
                    },
                });
            }
            ContractCall::StartEmergency => {
                state.require_controller(signer)?;
                state.emergency = true;
            }
            ContractCall::StopEmergency => {
                state.require_controller(signer)?;
                state.emergency = false;
            }
            ContractCall::FreezeAccount { target, freeze } => {
                state.require_controller(signer)?;
                if freeze {
                    state.frozen.insert(target);
                } else {
                    state.frozen.remove(&target);
                }
            }
            ContractCall::SetBsToken(address) => {
                state.require_owner(signer)?;
                state.bs_token = address;
            }
            ContractCall::SetMerchant(address) => {
                state.require_owner(signer)?;
                state.merchant = address;
            }
            ContractCall::TransferOwnership(address) => {
                state.require_owner(signer)?;
                state.owner = address;
            }
        }

        let tx = state.next_transaction_id();
        drop(state);

        if let Some(event) = event {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }

        Ok(tx)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn query(&self, query: LedgerQuery) -> Result<LedgerValue, LedgerError> {
        let state = self.state();
        let value = match query {
            LedgerQuery::Emergency => LedgerValue::Bool(state.emergency),
            LedgerQuery::FrozenAccount(account) => {
                LedgerValue::Bool(state.frozen.contains(&account))
            }
            LedgerQuery::BalanceOf(account) => LedgerValue::Uint(state.balance(&account)),
            LedgerQuery::Allowance { owner, spender } => {
                LedgerValue::Uint(state.allowance(&owner, &spender))
            }
            LedgerQuery::Owner => LedgerValue::Address(state.owner.clone()),
            LedgerQuery::Merchant => LedgerValue::Address(state.merchant.clone()),
            LedgerQuery::BsToken => LedgerValue::Address(state.bs_token.clone()),
        };
        Ok(value)
    }

    async fn submit(
        &self,
        call: ContractCall,
        options: SubmitOptions,
    ) -> Result<TransactionId, LedgerError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.apply(call, &options.from)
    }

    async fn subscribe(&self, filter: EventFilter) -> Result<EventStream, LedgerError> {
        let EventFilter::CashOut = filter;
        let receiver = self.events.subscribe();

        let events = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(events))
    }
}

#[async_trait]
impl AccountUnlocker for InMemoryLedger {
    async fn unlock(&self, account: &Address, credential: &Credential) -> Result<(), UnlockError> {
        let mut state = self.state();
        match state.passwords.get(account) {
            Some(expected) if expected == credential => {
                state.unlocked.insert(account.clone());
                Ok(())
            }
            _ => Err(UnlockError::InvalidCredential {
                account: account.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn options(from: &Address) -> SubmitOptions {
        SubmitOptions {
            from: from.clone(),
            gas_limit: 3_000_000,
        }
    }

    async fn ledger_with_unlocked(accounts: &[Address]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new(addr(1), addr(2));
        for account in accounts {
            ledger.register_account(account.clone(), Credential::default());
            ledger
                .unlock(account, &Credential::default())
                .await
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn test_locked_signer_is_rejected() {
        let ledger = InMemoryLedger::new(addr(1), addr(2));
        ledger.cash_in(&addr(3), 10u64).unwrap();

        let err = ledger
            .submit(
                ContractCall::Transfer {
                    to: addr(4),
                    amount: U256::from(1u64),
                },
                options(&addr(3)),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("is locked"));
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_does_not_unlock() {
        let ledger = InMemoryLedger::new(addr(1), addr(2));
        ledger.register_account(addr(3), Credential::new("right"));

        let err = ledger
            .unlock(&addr(3), &Credential::new("wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, UnlockError::InvalidCredential { account: addr(3) });
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let ledger = ledger_with_unlocked(&[addr(3)]).await;
        ledger.cash_in(&addr(3), 100u64).unwrap();

        ledger
            .submit(
                ContractCall::Transfer {
                    to: addr(4),
                    amount: U256::from(40u64),
                },
                options(&addr(3)),
            )
            .await
            .unwrap();

        assert_eq!(
            ledger.query(LedgerQuery::BalanceOf(addr(3))).await.unwrap(),
            LedgerValue::Uint(U256::from(60u64))
        );
        assert_eq!(
            ledger.query(LedgerQuery::BalanceOf(addr(4))).await.unwrap(),
            LedgerValue::Uint(U256::from(40u64))
        );
    }

    #[tokio::test]
    async fn test_rejected_transfer_into_full_balance_keeps_sender_funds() {
        let ledger = ledger_with_unlocked(&[addr(3)]).await;
        ledger.cash_in(&addr(3), 10u64).unwrap();
        ledger.cash_in(&addr(4), U256::MAX).unwrap();

        let err = ledger
            .submit(
                ContractCall::Transfer {
                    to: addr(4),
                    amount: U256::from(5u64),
                },
                options(&addr(3)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::rejected("balance overflow"));

        assert_eq!(
            ledger.query(LedgerQuery::BalanceOf(addr(3))).await.unwrap(),
            LedgerValue::Uint(U256::from(10u64))
        );
        assert_eq!(
            ledger.query(LedgerQuery::BalanceOf(addr(4))).await.unwrap(),
            LedgerValue::Uint(U256::MAX)
        );
    }

    #[tokio::test]
    async fn test_rejected_transfer_from_keeps_allowance() {
        let ledger = ledger_with_unlocked(&[addr(3), addr(5)]).await;
        ledger.cash_in(&addr(3), 10u64).unwrap();
        ledger.cash_in(&addr(4), U256::MAX).unwrap();
        ledger
            .submit(
                ContractCall::Approve {
                    spender: addr(5),
                    amount: U256::from(10u64),
                },
                options(&addr(3)),
            )
            .await
            .unwrap();

        assert!(ledger
            .submit(
                ContractCall::TransferFrom {
                    from: addr(3),
                    to: addr(4),
                    amount: U256::from(5u64),
                },
                options(&addr(5)),
            )
            .await
            .is_err());

        assert_eq!(
            ledger.query(LedgerQuery::BalanceOf(addr(3))).await.unwrap(),
            LedgerValue::Uint(U256::from(10u64))
        );
        assert_eq!(
            ledger
                .query(LedgerQuery::Allowance {
                    owner: addr(3),
                    spender: addr(5)
                })
                .await
                .unwrap(),
            LedgerValue::Uint(U256::from(10u64))
        );
    }

    #[tokio::test]
    async fn test_self_transfer_keeps_balance() {
        let ledger = ledger_with_unlocked(&[addr(3)]).await;
        ledger.cash_in(&addr(3), 10u64).unwrap();

        ledger
            .submit(
                ContractCall::Transfer {
                    to: addr(3),
                    amount: U256::from(4u64),
                },
                options(&addr(3)),
            )
            .await
            .unwrap();

        assert_eq!(
            ledger.query(LedgerQuery::BalanceOf(addr(3))).await.unwrap(),
            LedgerValue::Uint(U256::from(10u64))
        );
    }

    #[tokio::test]
    async fn test_controls_require_owner_or_merchant() {
        let ledger = ledger_with_unlocked(&[addr(2), addr(3)]).await;

        assert!(ledger
            .submit(ContractCall::StartEmergency, options(&addr(3)))
            .await
            .is_err());
        ledger
            .submit(ContractCall::StartEmergency, options(&addr(2)))
            .await
            .unwrap();
        assert_eq!(
            ledger.query(LedgerQuery::Emergency).await.unwrap(),
            LedgerValue::Bool(true)
        );

        // Merchant cannot change ownership.
        assert!(ledger
            .submit(ContractCall::TransferOwnership(addr(3)), options(&addr(2)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_transfer_from_consumes_allowance() {
        let ledger = ledger_with_unlocked(&[addr(3), addr(5)]).await;
        ledger.cash_in(&addr(3), 100u64).unwrap();

        ledger
            .submit(
                ContractCall::Approve {
                    spender: addr(5),
                    amount: U256::from(70u64),
                },
                options(&addr(3)),
            )
            .await
            .unwrap();
        ledger
            .submit(
                ContractCall::TransferFrom {
                    from: addr(3),
                    to: addr(4),
                    amount: U256::from(50u64),
                },
                options(&addr(5)),
            )
            .await
            .unwrap();

        assert_eq!(
            ledger
                .query(LedgerQuery::Allowance {
                    owner: addr(3),
                    spender: addr(5)
                })
                .await
                .unwrap(),
            LedgerValue::Uint(U256::from(20u64))
        );
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique() {
        let ledger = ledger_with_unlocked(&[addr(1)]).await;
        let first = ledger
            .submit(ContractCall::StartEmergency, options(&addr(1)))
            .await
            .unwrap();
        let second = ledger
            .submit(ContractCall::StopEmergency, options(&addr(1)))
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 66);
    }
}
