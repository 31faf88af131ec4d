use crate::error::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Authoritative balance record for one user.
///
/// `ledger_balance` holds all recorded funds including amounts earmarked by
/// pending withdrawals; `locked_amount` is the earmarked portion. The spendable
/// balance is always derived, never stored. Mutations go through the wallet
/// store, which serializes them with a row-level lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub ledger_balance: Decimal,
    pub locked_amount: Decimal,
    /// Bumped on every mutation; lets readers detect concurrent updates.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates a new empty wallet. One wallet exists per account.
    pub fn new(user_id: Uuid, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            currency: currency.into(),
            ledger_balance: Decimal::ZERO,
            locked_amount: Decimal::ZERO,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Spendable balance: ledger balance minus locked funds.
    pub fn available_balance(&self) -> Decimal {
        self.ledger_balance - self.locked_amount
    }

    pub fn has_available(&self, amount: Decimal) -> bool {
        self.available_balance() >= amount
    }

    /// Increases the ledger balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "credit amount must be positive".to_string(),
            ));
        }
        self.ledger_balance += amount;
        self.touch();
        Ok(())
    }

    /// Decreases the ledger balance. Fails if the available balance would go
    /// negative, reporting the shortfall.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "debit amount must be positive".to_string(),
            ));
        }
        if !self.has_available(amount) {
            return Err(AppError::InsufficientBalance {
                requested: amount,
                available: self.available_balance(),
            });
        }
        self.ledger_balance -= amount;
        self.touch();
        Ok(())
    }

    /// Earmarks funds without reducing the ledger balance.
    pub fn lock_funds(&mut self, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "lock amount must be positive".to_string(),
            ));
        }
        if !self.has_available(amount) {
            return Err(AppError::InsufficientBalance {
                requested: amount,
                available: self.available_balance(),
            });
        }
        self.locked_amount += amount;
        self.touch();
        Ok(())
    }

    /// Releases previously earmarked funds back to the available balance.
    pub fn unlock_funds(&mut self, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "unlock amount must be positive".to_string(),
            ));
        }
        if amount > self.locked_amount {
            return Err(AppError::Validation(format!(
                "cannot unlock {} with only {} locked",
                amount, self.locked_amount
            )));
        }
        self.locked_amount -= amount;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
