use rust_decimal::Decimal;
use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error taxonomy.
///
/// Gateway-boundary errors (`Signature`, `Parse`) never reach the ledger;
/// `ConcurrencyConflict` is transient and safe to retry with backoff; the
/// remaining variants leave the affected transaction in a non-terminal or
/// explicitly-failed state for manual review.
#[derive(Debug, Error)]
pub enum AppError {
    /// Webhook signature did not match the shared secret. Nothing is applied.
    #[error("webhook signature verification failed")]
    Signature,

    /// Well-signed but malformed or unrecognized gateway payload. Acknowledged
    /// to the gateway, never applied.
    #[error("malformed gateway payload: {0}")]
    Parse(String),

    /// A settlement event for this reference was already applied. Non-fatal;
    /// callers treat it as an idempotent no-op.
    #[error("event for reference '{0}' was already applied")]
    DuplicateEvent(String),

    /// A debit or lock would push the available balance below zero.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    /// A transfer event arrived for a reference with no matching transaction.
    #[error("no transaction found for reference '{0}'")]
    UnknownReference(String),

    /// Active revenue split settings are inconsistent.
    #[error("invalid revenue split configuration: {0}")]
    InvalidSplitConfig(String),

    /// Wallet row lock could not be acquired within the bounded timeout, or
    /// the database reported a deadlock/serialization failure. Retryable.
    #[error("concurrent wallet access conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Returns true if the operation may succeed when retried after backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::ConcurrencyConflict(_) => true,
            AppError::Database(sqlx::Error::PoolTimedOut) => true,
            AppError::Database(sqlx::Error::Io(_)) => true,
            _ => false,
        }
    }

    /// Classifies a raw sqlx error, mapping lock-timeout, deadlock and
    /// serialization SQLSTATEs to the retryable `ConcurrencyConflict` variant.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            match db.code().as_deref() {
                // lock_not_available, deadlock_detected, serialization_failure
                Some("55P03") | Some("40P01") | Some("40001") => {
                    return AppError::ConcurrencyConflict(db.message().to_string());
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }

    /// Returns true if the error is a unique-constraint violation, the signal
    /// that another handler already applied the same reference.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
    }
}
