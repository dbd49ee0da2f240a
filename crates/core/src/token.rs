//! The token service: the public operation surface of the client.
//!
//! Mutating operations go through the [`Dispatcher`]. Reads are passed
//! straight to the ledger and only normalized.

use std::sync::Arc;

use bstoken_shared::{Address, AppConfig, Credential, NotificationConfig};
use primitive_types::U256;
use tracing::{debug, info};

use crate::dispatcher::{Dispatcher, OperationRequest};
use crate::error::TokenError;
use crate::ledger::{ContractCall, EventFilter, LedgerClient, LedgerQuery};
use crate::normalize::{
    expect_address, expect_bool, expect_uint, to_amount, AddressResult, AmountResult,
    EmergencyResult, FrozenResult, TxReceipt,
};
use crate::notify::{spawn_forwarder, CashOutSubscription, NotificationSink};
use crate::unlock::AccountUnlocker;

/// Process-wide settings for a [`BsToken`] instance.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Account that signs administrative operations.
    pub admin: Address,
    /// Credential that unlocks the admin account.
    pub admin_credential: Credential,
    /// Resource ceiling attached to every submission.
    pub gas_limit: u64,
    /// Cash-out notification settings.
    pub notifications: NotificationConfig,
}

impl TokenConfig {
    /// Builds the token settings from the application configuration.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            admin: config.admin.account.clone(),
            admin_credential: config.admin.password.clone(),
            gas_limit: config.ledger.gas_limit,
            notifications: config.notifications.clone(),
        }
    }
}

/// Client for the token contract.
pub struct BsToken {
    config: TokenConfig,
    ledger: Arc<dyn LedgerClient>,
    unlocker: Arc<dyn AccountUnlocker>,
    dispatcher: Dispatcher,
}

impl BsToken {
    /// Creates a token client. Construction has no side effects.
    #[must_use]
    pub fn new(
        config: TokenConfig,
        ledger: Arc<dyn LedgerClient>,
        unlocker: Arc<dyn AccountUnlocker>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&ledger), Arc::clone(&unlocker), config.gas_limit);
        Self {
            config,
            ledger,
            unlocker,
            dispatcher,
        }
    }

    /// Returns the token settings.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    // ========== Accounts ==========

    /// Unlocks the admin account.
    pub async fn unlock_admin_account(&self) -> Result<(), TokenError> {
        self.unlock_account(&self.config.admin, &self.config.admin_credential)
            .await
    }

    /// Unlocks an arbitrary account.
    pub async fn unlock_account(
        &self,
        account: &Address,
        credential: &Credential,
    ) -> Result<(), TokenError> {
        self.unlocker.unlock(account, credential).await?;
        Ok(())
    }

    // ========== Guarded operations ==========

    /// Moves `amount` from `from` to `to`.
    pub async fn transfer(
        &self,
        from: &Address,
        credential: &Credential,
        to: &Address,
        amount: impl Into<U256>,
    ) -> Result<TxReceipt, TokenError> {
        let call = ContractCall::Transfer {
            to: to.clone(),
            amount: amount.into(),
        };
        self.dispatch_as(from, credential, call).await
    }

    /// Lets `spender` move up to `amount` of `from`'s balance.
    pub async fn approve(
        &self,
        from: &Address,
        credential: &Credential,
        spender: &Address,
        amount: impl Into<U256>,
    ) -> Result<TxReceipt, TokenError> {
        let call = ContractCall::Approve {
            spender: spender.clone(),
            amount: amount.into(),
        };
        self.dispatch_as(from, credential, call).await
    }

    /// Approves `spender` and calls back into it with `to` and `id`.
    pub async fn approve_and_call(
        &self,
        from: &Address,
        credential: &Credential,
        spender: &Address,
        to: &Address,
        id: impl Into<U256>,
        amount: impl Into<U256>,
    ) -> Result<TxReceipt, TokenError> {
        let call = ContractCall::ApproveAndCall {
            spender: spender.clone(),
            to: to.clone(),
            id: id.into(),
            amount: amount.into(),
        };
        self.dispatch_as(from, credential, call).await
    }

    /// Moves `amount` from `from` to `to`, signed by `spender`.
    pub async fn transfer_from(
        &self,
        spender: &Address,
        credential: &Credential,
        from: &Address,
        to: &Address,
        amount: impl Into<U256>,
    ) -> Result<TxReceipt, TokenError> {
        let call = ContractCall::TransferFrom {
            from: from.clone(),
            to: to.clone(),
            amount: amount.into(),
        };
        self.dispatch_as(spender, credential, call).await
    }

    /// Converts `amount` of `from`'s balance into a bank transfer.
    pub async fn cash_out(
        &self,
        from: &Address,
        credential: &Credential,
        amount: impl Into<U256>,
        bank_account: &str,
    ) -> Result<TxReceipt, TokenError> {
        let call = ContractCall::CashOut {
            amount: amount.into(),
            bank_account: bank_account.to_string(),
        };
        self.dispatch_as(from, credential, call).await
    }

    // ========== Administrative operations ==========

    /// Raises the emergency stop.
    pub async fn start_emergency(&self) -> Result<TxReceipt, TokenError> {
        self.dispatch_as_admin(ContractCall::StartEmergency).await
    }

    /// Lowers the emergency stop.
    pub async fn stop_emergency(&self) -> Result<TxReceipt, TokenError> {
        self.dispatch_as_admin(ContractCall::StopEmergency).await
    }

    /// Sets or clears the frozen flag of `target`.
    pub async fn freeze_account(
        &self,
        target: &Address,
        freeze: bool,
    ) -> Result<TxReceipt, TokenError> {
        self.dispatch_as_admin(ContractCall::FreezeAccount {
            target: target.clone(),
            freeze,
        })
        .await
    }

    /// Points the frontend at a new token logic contract.
    pub async fn set_bs_token(&self, bs_token: &Address) -> Result<TxReceipt, TokenError> {
        self.dispatch_as_admin(ContractCall::SetBsToken(bs_token.clone()))
            .await
    }

    /// Replaces the merchant account.
    pub async fn set_merchant(&self, merchant: &Address) -> Result<TxReceipt, TokenError> {
        self.dispatch_as_admin(ContractCall::SetMerchant(merchant.clone()))
            .await
    }

    /// Hands contract ownership to `new_owner`.
    pub async fn transfer_ownership(&self, new_owner: &Address) -> Result<TxReceipt, TokenError> {
        self.dispatch_as_admin(ContractCall::TransferOwnership(new_owner.clone()))
            .await
    }

    // ========== Reads ==========

    /// Balance of `account`.
    pub async fn balance_of(&self, account: &Address) -> Result<AmountResult, TokenError> {
        let balance = self
            .ledger
            .query(LedgerQuery::BalanceOf(account.clone()))
            .await
            .and_then(expect_uint)
            .map_err(TokenError::Query)?;
        Ok(AmountResult {
            amount: to_amount(balance)?,
        })
    }

    /// Amount `spender` may still move out of `owner`'s balance.
    pub async fn allowance(
        &self,
        owner: &Address,
        spender: &Address,
    ) -> Result<AmountResult, TokenError> {
        let allowance = self
            .ledger
            .query(LedgerQuery::Allowance {
                owner: owner.clone(),
                spender: spender.clone(),
            })
            .await
            .and_then(expect_uint)
            .map_err(TokenError::Query)?;
        Ok(AmountResult {
            amount: to_amount(allowance)?,
        })
    }

    /// Frozen flag of `account`.
    pub async fn frozen_account(&self, account: &Address) -> Result<FrozenResult, TokenError> {
        let frozen = self
            .ledger
            .query(LedgerQuery::FrozenAccount(account.clone()))
            .await
            .and_then(expect_bool)
            .map_err(TokenError::Query)?;
        Ok(FrozenResult { frozen })
    }

    /// Emergency-stop flag.
    pub async fn is_emergency(&self) -> Result<EmergencyResult, TokenError> {
        let emergency = self
            .ledger
            .query(LedgerQuery::Emergency)
            .await
            .and_then(expect_bool)
            .map_err(TokenError::Query)?;
        Ok(EmergencyResult { emergency })
    }

    /// Contract owner.
    pub async fn get_owner(&self) -> Result<AddressResult, TokenError> {
        self.query_address(LedgerQuery::Owner).await
    }

    /// Merchant account.
    pub async fn get_merchant(&self) -> Result<AddressResult, TokenError> {
        self.query_address(LedgerQuery::Merchant).await
    }

    /// Token logic contract the frontend forwards to.
    pub async fn get_bs_token(&self) -> Result<AddressResult, TokenError> {
        self.query_address(LedgerQuery::BsToken).await
    }

    // ========== Events ==========

    /// Forwards every cash-out event to `sink`, addressed to `recipient`.
    ///
    /// The subscription runs until the returned handle is cancelled or
    /// dropped, or the ledger closes the event stream.
    pub async fn subscribe_cash_outs(
        &self,
        sink: Arc<dyn NotificationSink>,
        recipient: impl Into<String>,
    ) -> Result<CashOutSubscription, TokenError> {
        let events = self
            .ledger
            .subscribe(EventFilter::CashOut)
            .await
            .map_err(TokenError::Query)?;
        info!("subscribed to cash-out events");
        Ok(spawn_forwarder(events, sink, recipient.into()))
    }

    /// Forwards cash-out events to the configured recipient.
    ///
    /// Returns `None` without subscribing when notifications are disabled or
    /// no recipient is configured.
    pub async fn subscribe_configured_cash_outs(
        &self,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Option<CashOutSubscription>, TokenError> {
        let notifications = &self.config.notifications;
        if !notifications.enabled || notifications.cash_out_recipient.is_empty() {
            debug!("cash-out notifications disabled");
            return Ok(None);
        }

        self.subscribe_cash_outs(sink, notifications.cash_out_recipient.clone())
            .await
            .map(Some)
    }

    // ========== Internals ==========

    async fn query_address(&self, query: LedgerQuery) -> Result<AddressResult, TokenError> {
        let value = self
            .ledger
            .query(query)
            .await
            .and_then(expect_address)
            .map_err(TokenError::Query)?;
        Ok(AddressResult { value })
    }

    async fn dispatch_as(
        &self,
        signer: &Address,
        credential: &Credential,
        call: ContractCall,
    ) -> Result<TxReceipt, TokenError> {
        self.dispatcher
            .dispatch(OperationRequest {
                signer: signer.clone(),
                credential: credential.clone(),
                call,
            })
            .await
    }

    async fn dispatch_as_admin(&self, call: ContractCall) -> Result<TxReceipt, TokenError> {
        self.dispatch_as(&self.config.admin, &self.config.admin_credential, call)
            .await
    }
}
