//! Property-based tests for dispatch guards.
//!
//! Each property drives the token service against the in-memory ledger and
//! checks both the reported failure and that nothing reached the ledger.

use std::sync::Arc;

use bstoken_shared::{Address, Credential, NotificationConfig};
use proptest::prelude::*;

use crate::error::{GuardFailure, TokenError};
use crate::ledger::InMemoryLedger;
use crate::normalize::TxReceipt;
use crate::token::{BsToken, TokenConfig};

fn addr(n: u8) -> Address {
    Address::parse(&format!("0x{:040x}", n)).unwrap()
}

const ADMIN: u8 = 1;
const MERCHANT: u8 = 2;
const SOURCE: u8 = 3;
const TARGET: u8 = 4;
const SPENDER: u8 = 5;

/// Mutating operations sourced from `SOURCE`.
#[derive(Debug, Clone, Copy)]
enum Op {
    Transfer,
    Approve,
    ApproveAndCall,
    CashOut,
    TransferFrom,
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Transfer),
        Just(Op::Approve),
        Just(Op::ApproveAndCall),
        Just(Op::CashOut),
        Just(Op::TransferFrom),
    ]
}

fn funds_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Transfer),
        Just(Op::Approve),
        Just(Op::ApproveAndCall),
        Just(Op::CashOut),
    ]
}

struct Fixture {
    ledger: Arc<InMemoryLedger>,
    token: BsToken,
}

impl Fixture {
    fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new(addr(ADMIN), addr(MERCHANT)));
        for n in [ADMIN, MERCHANT, SOURCE, TARGET, SPENDER] {
            ledger.register_account(addr(n), Credential::default());
        }
        let config = TokenConfig {
            admin: addr(ADMIN),
            admin_credential: Credential::default(),
            gas_limit: 3_000_000,
            notifications: NotificationConfig::default(),
        };
        let token = BsToken::new(config, ledger.clone(), ledger.clone());
        Self { ledger, token }
    }

    async fn run(&self, op: Op, amount: u64) -> Result<TxReceipt, TokenError> {
        let cred = Credential::default();
        match op {
            Op::Transfer => {
                self.token
                    .transfer(&addr(SOURCE), &cred, &addr(TARGET), amount)
                    .await
            }
            Op::Approve => {
                self.token
                    .approve(&addr(SOURCE), &cred, &addr(SPENDER), amount)
                    .await
            }
            Op::ApproveAndCall => {
                self.token
                    .approve_and_call(&addr(SOURCE), &cred, &addr(SPENDER), &addr(TARGET), 1u64, amount)
                    .await
            }
            Op::CashOut => {
                self.token
                    .cash_out(&addr(SOURCE), &cred, amount, "ES7921000813610123456789")
                    .await
            }
            Op::TransferFrom => {
                self.token
                    .transfer_from(&addr(SPENDER), &cred, &addr(SOURCE), &addr(TARGET), amount)
                    .await
            }
        }
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A frozen source account fails every mutating operation before submit.
    #[test]
    fn prop_frozen_account_never_submits(
        op in any_op(),
        balance in 0u64..1_000,
        amount in 0u64..1_000,
    ) {
        let (err, submitted) = block_on(async {
            let fx = Fixture::new();
            fx.ledger.cash_in(&addr(SOURCE), balance).unwrap();
            fx.token.freeze_account(&addr(SOURCE), true).await.unwrap();

            let before = fx.ledger.submission_count();
            let err = fx.run(op, amount).await.unwrap_err();
            (err, fx.ledger.submission_count() - before)
        });

        prop_assert_eq!(err, GuardFailure::AccountFrozen { account: addr(SOURCE) }.into());
        prop_assert_eq!(submitted, 0);
    }

    /// The emergency stop is reported ahead of every other guard.
    #[test]
    fn prop_emergency_checked_first(
        op in any_op(),
        frozen in any::<bool>(),
        balance in 0u64..1_000,
        amount in 0u64..1_000,
    ) {
        let (err, submitted) = block_on(async {
            let fx = Fixture::new();
            fx.ledger.cash_in(&addr(SOURCE), balance).unwrap();
            if frozen {
                fx.token.freeze_account(&addr(SOURCE), true).await.unwrap();
            }
            fx.token.start_emergency().await.unwrap();

            let before = fx.ledger.submission_count();
            let err = fx.run(op, amount).await.unwrap_err();
            (err, fx.ledger.submission_count() - before)
        });

        prop_assert_eq!(err, GuardFailure::ContractStopped.into());
        prop_assert_eq!(submitted, 0);
    }

    /// Spending more than the balance fails before submit.
    #[test]
    fn prop_insufficient_funds_never_submits(
        op in funds_op(),
        balance in 0u64..1_000,
        excess in 1u64..1_000,
    ) {
        let (err, submitted) = block_on(async {
            let fx = Fixture::new();
            fx.ledger.cash_in(&addr(SOURCE), balance).unwrap();

            let before = fx.ledger.submission_count();
            let err = fx.run(op, balance + excess).await.unwrap_err();
            (err, fx.ledger.submission_count() - before)
        });

        prop_assert_eq!(err, GuardFailure::InsufficientFunds { account: addr(SOURCE) }.into());
        prop_assert_eq!(submitted, 0);
    }

    /// A short allowance is reported ahead of a short balance.
    #[test]
    fn prop_allowance_checked_before_balance(
        balance in 0u64..1_000,
        allowance in 0u64..1_000,
        excess in 1u64..1_000,
    ) {
        let amount = allowance + excess;
        let (err, submitted) = block_on(async {
            let fx = Fixture::new();
            fx.ledger.cash_in(&addr(SOURCE), 1_000u64).unwrap();
            fx.token
                .approve(&addr(SOURCE), &Credential::default(), &addr(SPENDER), allowance)
                .await
                .unwrap();
            // Drain the owner down to `balance` so both guards may fail.
            fx.token
                .transfer(&addr(SOURCE), &Credential::default(), &addr(TARGET), 1_000 - balance)
                .await
                .unwrap();

            let before = fx.ledger.submission_count();
            let err = fx.run(Op::TransferFrom, amount).await.unwrap_err();
            (err, fx.ledger.submission_count() - before)
        });

        prop_assert_eq!(err, GuardFailure::InsufficientAllowance { spender: addr(SPENDER) }.into());
        prop_assert_eq!(submitted, 0);
    }

    /// An accepted transfer debits the sender and credits the recipient by the same amount.
    #[test]
    fn prop_transfer_conserves_balance(
        balance in 0u64..1_000_000,
        amount in 0u64..1_000_000,
    ) {
        prop_assume!(amount <= balance);

        let (from, to) = block_on(async {
            let fx = Fixture::new();
            fx.ledger.cash_in(&addr(SOURCE), balance).unwrap();
            fx.run(Op::Transfer, amount).await.unwrap();

            let from = fx.token.balance_of(&addr(SOURCE)).await.unwrap().amount;
            let to = fx.token.balance_of(&addr(TARGET)).await.unwrap().amount;
            (from, to)
        });

        prop_assert_eq!(from, u128::from(balance - amount));
        prop_assert_eq!(to, u128::from(amount));
    }
}
