//! Account unlock contract.

use async_trait::async_trait;
use bstoken_shared::{Address, Credential};

use crate::error::UnlockError;

/// Authorizes an account to sign transactions for a bounded window.
///
/// The window length is up to the implementation; callers unlock right
/// before every mutating submission instead of tracking it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountUnlocker: Send + Sync {
    /// Unlock `account` with `credential`.
    async fn unlock(&self, account: &Address, credential: &Credential) -> Result<(), UnlockError>;
}
