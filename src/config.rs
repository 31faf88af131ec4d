use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub gateway: GatewaySettings,
    pub withdrawal: WithdrawalSettings,
    pub reconciliation: ReconciliationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

/// Payment gateway credentials and endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub base_url: String,
    pub secret_key: String,
    /// Shared secret used to verify inbound webhook signatures.
    pub webhook_secret: String,
    /// URL the gateway redirects the customer to after checkout.
    pub callback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalSettings {
    /// Smallest withdrawal amount the workflow accepts.
    pub minimum_amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationSettings {
    /// Bounded retry count for transient failures while applying an event.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Wallet row lock acquisition timeout. Exceeding it surfaces a
    /// retryable conflict instead of blocking the webhook handler.
    pub lock_timeout_ms: u64,
    /// Age after which a still-pending transaction is surfaced for manual
    /// reconciliation.
    pub stale_pending_hours: i64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
