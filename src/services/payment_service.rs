use crate::error::{AppError, Result};
use crate::gateway::{InitiatedPayment, PaymentGatewayClient};
use crate::models::{PaymentPurpose, Transaction, TransactionStatus};
use crate::repositories::{TransactionRepository, WalletRepository};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Generates a payment reference: a purpose prefix plus a v4 UUID. The
/// reference is the idempotency key for the whole settlement lifecycle.
pub fn generate_reference(purpose: PaymentPurpose) -> String {
    let prefix = match purpose {
        PaymentPurpose::WalletFunding => "FND",
        PaymentPurpose::InspectionPayment => "INS",
        PaymentPurpose::BookingPayment => "BKG",
        PaymentPurpose::WithdrawalPayout => "WTH",
    };
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Parameters for initiating a gateway payment.
#[derive(Debug, Clone)]
pub struct InitiationRequest {
    pub amount: Decimal,
    pub purpose: PaymentPurpose,
    pub related_id: Option<Uuid>,
    pub user_id: Uuid,
    pub email: String,
    /// Dealer or host credited when the payment settles. Required for
    /// split-bearing purposes.
    pub beneficiary_id: Option<Uuid>,
}

/// Initiation surface consumed by the marketplace subsystems: records a
/// pending transaction under a fresh reference and registers the checkout
/// with the gateway. Callers poll the transaction by reference; settlement
/// arrives through the webhook path.
pub struct PaymentService {
    pool: PgPool,
    transaction_repo: TransactionRepository,
    wallet_repo: WalletRepository,
    gateway: Arc<dyn PaymentGatewayClient>,
}

impl PaymentService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGatewayClient>) -> Self {
        Self {
            transaction_repo: TransactionRepository::new(pool.clone()),
            wallet_repo: WalletRepository::new(pool.clone()),
            pool,
            gateway,
        }
    }

    #[instrument(skip(self, request), fields(purpose = ?request.purpose, amount = %request.amount))]
    pub async fn initiate(&self, request: InitiationRequest) -> Result<InitiatedPayment> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }
        if request.email.trim().is_empty() {
            return Err(AppError::Validation(
                "a customer email is required".to_string(),
            ));
        }

        let reference = generate_reference(request.purpose);
        let transaction = self.build_transaction(&reference, &request).await?;
        let transaction = self.transaction_repo.create(&transaction).await?;

        let metadata = serde_json::json!({
            "purpose": request.purpose,
            "related_id": request.related_id,
            "user_id": request.user_id,
        });

        match self
            .gateway
            .initialize_payment(&reference, request.amount, &request.email, metadata)
            .await
        {
            Ok(initiated) => {
                info!(reference = %reference, "payment initiated");
                Ok(initiated)
            }
            Err(e) => {
                // The checkout never existed on the gateway; terminalize the
                // record so the reference cannot settle later.
                warn!(reference = %reference, "gateway initialization failed: {e}");
                let mut conn = self.pool.acquire().await.map_err(AppError::from_sqlx)?;
                TransactionRepository::transition_status_in_tx(
                    &mut *conn,
                    transaction.id,
                    TransactionStatus::Pending,
                    TransactionStatus::Failed,
                )
                .await?;
                Err(e)
            }
        }
    }

    /// Terminal-status polling surface, keyed by reference.
    pub async fn status(&self, reference: &str) -> Result<Transaction> {
        self.transaction_repo
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::UnknownReference(reference.to_string()))
    }

    async fn build_transaction(
        &self,
        reference: &str,
        request: &InitiationRequest,
    ) -> Result<Transaction> {
        match request.purpose {
            PaymentPurpose::WalletFunding => {
                let wallet = self
                    .wallet_repo
                    .find_by_user_id(request.user_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("wallet for user '{}'", request.user_id))
                    })?;
                Ok(Transaction::funding(
                    reference,
                    request.user_id,
                    wallet.id,
                    request.amount,
                    wallet.currency,
                ))
            }
            PaymentPurpose::InspectionPayment | PaymentPurpose::BookingPayment => {
                if request.purpose.is_split_bearing() && request.beneficiary_id.is_none() {
                    return Err(AppError::Validation(
                        "a beneficiary is required for split-bearing payments".to_string(),
                    ));
                }
                Ok(Transaction::gateway_payment(
                    reference,
                    request.purpose,
                    request.user_id,
                    request.beneficiary_id,
                    request.related_id,
                    request.amount,
                    "NGN",
                ))
            }
            PaymentPurpose::WithdrawalPayout => Err(AppError::Validation(
                "payouts are initiated through the withdrawal workflow".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_prefixes() {
        assert!(generate_reference(PaymentPurpose::WalletFunding).starts_with("FND-"));
        assert!(generate_reference(PaymentPurpose::InspectionPayment).starts_with("INS-"));
        assert!(generate_reference(PaymentPurpose::BookingPayment).starts_with("BKG-"));
        assert!(generate_reference(PaymentPurpose::WithdrawalPayout).starts_with("WTH-"));
    }

    #[test]
    fn test_references_are_unique() {
        let a = generate_reference(PaymentPurpose::WalletFunding);
        let b = generate_reference(PaymentPurpose::WalletFunding);
        assert_ne!(a, b);
    }
}
