//! Application configuration management.

use serde::Deserialize;

use crate::types::{Address, Credential};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Administrator account configuration.
    pub admin: AdminConfig,
    /// Ledger submission configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Cash-out notification configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Email configuration.
    #[serde(default)]
    pub email: EmailConfig,
}

/// Administrator account used to sign administrative operations.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Admin account address.
    pub account: Address,
    /// Password that unlocks the admin account.
    #[serde(default)]
    pub password: Credential,
}

/// Ledger submission configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Resource ceiling attached to every submitted transaction.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

fn default_gas_limit() -> u64 {
    3_000_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            gas_limit: default_gas_limit(),
        }
    }
}

/// Cash-out notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Whether cash-out events should be forwarded at all.
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Mailbox that receives cash-out notices.
    #[serde(default)]
    pub cash_out_recipient: String,
}

fn default_notifications_enabled() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            cash_out_recipient: String::new(),
        }
    }
}

/// Email (SMTP) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP host.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025 // mailpit / mailhog
}

fn default_from_email() -> String {
    "noreply@bstoken.local".to_string()
}

fn default_from_name() -> String {
    "BSToken".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones overriding earlier ones:
    /// `config/default`, `config/{RUN_MODE}`, then `BSTOKEN__*` variables.
    /// A `.env` file in the working directory is read into the environment first.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("BSTOKEN").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
