use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PaymentPurpose;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Request to open a wallet for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWalletRequest {
    pub user_id: Uuid,
    pub currency: Option<String>,
}

impl OpenWalletRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Some(currency) = &self.currency {
            if currency.len() != 3 {
                errors.push(ValidationError::new(
                    "currency",
                    "currency must be a 3-letter ISO 4217 code",
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request to initiate a gateway payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub amount: Decimal,
    pub purpose: PaymentPurpose,
    pub related_id: Option<Uuid>,
    pub user_id: Uuid,
    pub email: String,
    pub beneficiary_id: Option<Uuid>,
}

impl InitiatePaymentRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if self.email.trim().is_empty() {
            errors.push(ValidationError::new("email", "email cannot be empty"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request to create a withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub payout_reference: String,
}

impl CreateWithdrawalRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if self.payout_reference.trim().is_empty() {
            errors.push(ValidationError::new(
                "payout_reference",
                "payout_reference cannot be empty",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Reviewer decision payload for approve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveWithdrawalRequest {
    pub reviewer_id: Uuid,
}

/// Reviewer decision payload for reject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectWithdrawalRequest {
    pub reviewer_id: Uuid,
    pub reason: String,
}

impl RejectWithdrawalRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        if self.reason.trim().is_empty() {
            return Err(vec![ValidationError::new(
                "reason",
                "a rejection reason is required",
            )]);
        }
        Ok(())
    }
}

/// Owner cancellation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelWithdrawalRequest {
    pub user_id: Uuid,
}

/// Request to activate a new revenue split configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateSplitSettingsRequest {
    pub dealer_percentage: Decimal,
    pub platform_percentage: Decimal,
}

/// Query parameters for listing transactions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListTransactionsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for listing withdrawals.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListWithdrawalsQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_withdrawal_request_validation() {
        let valid = CreateWithdrawalRequest {
            user_id: Uuid::new_v4(),
            amount: dec!(5000),
            payout_reference: "RCP_abc".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateWithdrawalRequest {
            user_id: Uuid::new_v4(),
            amount: dec!(-5),
            payout_reference: " ".to_string(),
        };
        let errors = invalid.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_reject_requires_reason() {
        let invalid = RejectWithdrawalRequest {
            reviewer_id: Uuid::new_v4(),
            reason: "".to_string(),
        };
        assert!(invalid.validate().is_err());
    }
}
