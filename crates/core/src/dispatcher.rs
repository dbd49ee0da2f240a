//! Operation dispatch: validate, unlock, submit.
//!
//! Each request moves through `Validating -> Unlocking -> Submitting ->
//! Resolved`. Any failure resolves the request immediately; nothing is
//! retried at this layer.

use std::sync::Arc;

use bstoken_shared::{Address, Credential};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::TokenError;
use crate::guard::{self, GuardPlan};
use crate::ledger::{ContractCall, LedgerClient, SubmitOptions};
use crate::normalize::TxReceipt;
use crate::unlock::AccountUnlocker;

/// Dispatch stage of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStage {
    /// Running guards.
    Validating,
    /// Authorizing the signer.
    Unlocking,
    /// Submitting the mutating call.
    Submitting,
    /// Finished, with a receipt or an error.
    Resolved,
}

/// One mutating call and the account that signs it.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Signing account.
    pub signer: Address,
    /// Credential that unlocks the signer.
    pub credential: Credential,
    /// The call to submit.
    pub call: ContractCall,
}

/// Runs mutating calls against the ledger.
pub struct Dispatcher {
    ledger: Arc<dyn LedgerClient>,
    unlocker: Arc<dyn AccountUnlocker>,
    gas_limit: u64,
}

impl Dispatcher {
    /// Creates a dispatcher that attaches `gas_limit` to every submission.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        unlocker: Arc<dyn AccountUnlocker>,
        gas_limit: u64,
    ) -> Self {
        Self {
            ledger,
            unlocker,
            gas_limit,
        }
    }

    /// Dispatches one request.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails: a guard or query
    /// failure, an unlock failure, or the ledger's rejection of the call.
    pub async fn dispatch(&self, request: OperationRequest) -> Result<TxReceipt, TokenError> {
        let span = info_span!(
            "dispatch",
            operation = request.call.method(),
            signer = %request.signer,
        );

        async move {
            let result = self.run(request).await;
            match &result {
                Ok(receipt) => info!(
                    stage = ?DispatchStage::Resolved,
                    transaction_id = %receipt.transaction_id,
                    "operation accepted"
                ),
                Err(err) => warn!(
                    stage = ?err.stage(),
                    code = err.error_code(),
                    error = %err,
                    "operation failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: OperationRequest) -> Result<TxReceipt, TokenError> {
        let OperationRequest {
            signer,
            credential,
            call,
        } = request;

        debug!(stage = ?DispatchStage::Validating);
        if let Some(plan) = GuardPlan::for_call(&signer, &call) {
            guard::evaluate(self.ledger.as_ref(), &plan).await?;
        }

        debug!(stage = ?DispatchStage::Unlocking);
        self.unlocker.unlock(&signer, &credential).await?;

        debug!(stage = ?DispatchStage::Submitting);
        let options = SubmitOptions {
            from: signer,
            gas_limit: self.gas_limit,
        };
        let transaction_id = self
            .ledger
            .submit(call, options)
            .await
            .map_err(TokenError::Submission)?;

        Ok(TxReceipt { transaction_id })
    }
}
