//! Common types used across the workspace.

pub mod address;
pub mod credential;
pub mod transaction;

pub use address::{Address, AddressError};
pub use credential::Credential;
pub use transaction::TransactionId;
