//! Client-side logic for the BSToken ledger.
//!
//! The token contract lives on the ledger; this crate decides what may be
//! sent to it. Mutating operations are checked against the ledger's own
//! state, the signer is unlocked, and only then is the call submitted.
//! ZERO transport dependencies: the ledger client is injected.
//!
//! # Modules
//!
//! - `ledger` - Ledger client contract and an in-memory backend
//! - `unlock` - Account unlock contract
//! - `guard` - Precondition checks run before dispatch
//! - `dispatcher` - Validate, unlock, submit
//! - `normalize` - Result shapes and integer conversion
//! - `notify` - Cash-out event forwarding
//! - `token` - The public token service

pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod normalize;
pub mod notify;
pub mod token;
pub mod unlock;

#[cfg(test)]
mod guard_props;

pub use dispatcher::{DispatchStage, Dispatcher, OperationRequest};
pub use error::{GuardFailure, LedgerError, TokenError, UnlockError};
pub use guard::GuardPlan;
pub use ledger::{InMemoryLedger, LedgerClient};
pub use normalize::{AddressResult, AmountResult, EmergencyResult, FrozenResult, TxReceipt};
pub use notify::{CashOutSubscription, NotificationSink, NotifyError};
pub use token::{BsToken, TokenConfig};
pub use unlock::AccountUnlocker;
