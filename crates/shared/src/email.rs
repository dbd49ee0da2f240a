//! SMTP delivery of operator notices.
//!
//! The transport and sender mailbox are resolved once from [`EmailConfig`];
//! each notice is a plain-text message to a single recipient.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::EmailConfig;

type SmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

/// Email delivery errors.
#[derive(Debug, Error)]
pub enum EmailError {
    /// A sender or recipient mailbox did not parse.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    /// The SMTP relay could not be configured.
    #[error("Invalid SMTP relay: {0}")]
    Relay(String),
    /// The message could not be assembled.
    #[error("Failed to build email: {0}")]
    BuildError(String),
    /// The SMTP server refused or dropped the message.
    #[error("Failed to send email: {0}")]
    SendError(String),
}

/// Sends plain-text notices over SMTP.
#[derive(Clone)]
pub struct EmailService {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl EmailService {
    /// Resolves the sender mailbox and SMTP transport from `config`.
    ///
    /// Without a username the relay is reached in plain text, which suits a
    /// local catcher such as mailpit. With one, TLS and credentials are used.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let address = config
            .from_email
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;
        let sender = Mailbox::new(Some(config.from_name.clone()), address);

        let transport = if config.smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build()
        } else {
            SmtpTransport::relay(&config.smtp_host)
                .map_err(|e| EmailError::Relay(e.to_string()))?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ))
                .build()
        };

        Ok(Self { transport, sender })
    }

    /// Sender mailbox stamped on every notice.
    #[must_use]
    pub fn sender(&self) -> &Mailbox {
        &self.sender
    }

    fn notice(&self, to_email: &str, subject: &str, body: &str) -> Result<Message, EmailError> {
        let recipient: Mailbox = to_email
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;

        Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::BuildError(e.to_string()))
    }

    /// Sends one notice to `to_email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the recipient does not parse or delivery fails.
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), EmailError> {
        let message = self.notice(to_email, subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendError(e.to_string()))?;
        Ok(())
    }
}
