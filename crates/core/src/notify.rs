//! Cash-out notifications.
//!
//! A subscription drains the ledger's cash-out events on a background task
//! and forwards each one to a [`NotificationSink`]. Delivery is best effort:
//! a failed notification is logged and the task moves on.

use std::sync::Arc;

use async_trait::async_trait;
use bstoken_shared::EmailService;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ledger::{CashOutArgs, EventStream, LedgerEvent};

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink could not deliver the message.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Destination for operator notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message.
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl NotificationSink for EmailService {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.send_email(recipient, subject, body)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

/// Handle to a running cash-out subscription.
///
/// Dropping the handle cancels the subscription.
#[derive(Debug)]
pub struct CashOutSubscription {
    task: JoinHandle<()>,
}

impl CashOutSubscription {
    /// Stops forwarding events.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the forwarding task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CashOutSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the task that forwards cash-out events to `sink`.
pub(crate) fn spawn_forwarder(
    mut events: EventStream,
    sink: Arc<dyn NotificationSink>,
    recipient: String,
) -> CashOutSubscription {
    let task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let LedgerEvent::CashOut { args } = event;
            let (subject, body) = render_cash_out(&args);

            match sink.notify(&recipient, &subject, &body).await {
                Ok(()) => debug!(account = %args.account, "cash-out notification sent"),
                Err(err) => warn!(
                    account = %args.account,
                    error = %err,
                    "cash-out notification failed"
                ),
            }
        }
        debug!("cash-out event stream ended");
    });

    CashOutSubscription { task }
}

fn render_cash_out(args: &CashOutArgs) -> (String, String) {
    let subject = format!("Cash out request from {}", args.account);
    let body = format!(
        "A cash out has been requested.\n\n\
         Account: {}\n\
         Amount: {}\n\
         Bank account: {}\n",
        args.account, args.amount, args.bank_account
    );
    (subject, body)
}
