//! Shared types, configuration, and email delivery for BSToken.
//!
//! This crate provides common pieces used by the token client:
//! - Account addresses, credentials, and transaction identifiers
//! - Configuration management
//! - SMTP email delivery

pub mod config;
pub mod email;
pub mod types;

pub use config::{AdminConfig, AppConfig, EmailConfig, LedgerConfig, NotificationConfig};
pub use email::{EmailError, EmailService};
pub use types::{Address, AddressError, Credential, TransactionId};
