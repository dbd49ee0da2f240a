//! Access to the on-chain token contract.
//!
//! - `client` - the typed client contract every ledger backend implements
//! - `memory` - an in-memory backend for tests and local runs

pub mod client;
pub mod memory;

pub use client::{
    CashOutArgs, ContractCall, EventFilter, EventStream, LedgerClient, LedgerEvent, LedgerQuery,
    LedgerValue, SubmitOptions,
};
pub use memory::InMemoryLedger;

#[cfg(test)]
pub use client::MockLedgerClient;
