use crate::config::WithdrawalSettings;
use crate::error::{AppError, Result};
use crate::events::{EventDispatcher, EventEnvelope, EventType, OutboundEvent, WithdrawalEvent};
use crate::gateway::PaymentGatewayClient;
use crate::models::{Transaction, TransactionStatus, WithdrawalRequest, WithdrawalStatus, WithdrawalStatusStat};
use crate::repositories::{TransactionRepository, WalletRepository, WithdrawalRepository};
use crate::services::payment_service::generate_reference;
use crate::services::wallet_store::WalletStore;
use crate::models::PaymentPurpose;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WithdrawalConfig {
    pub minimum_amount: Decimal,
    pub lock_timeout_ms: u64,
}

impl From<&WithdrawalSettings> for WithdrawalConfig {
    fn from(settings: &WithdrawalSettings) -> Self {
        Self {
            minimum_amount: settings.minimum_amount,
            lock_timeout_ms: 2000,
        }
    }
}

/// Manual-approval withdrawal state machine.
///
/// Creating a request locks the funds immediately, so the available balance
/// already nets out every other pending or approved request on the same
/// wallet; concurrent requests whose sum exceeds the balance serialize on the
/// wallet row lock and the excess is rejected with the shortfall.
pub struct WithdrawalWorkflow {
    pool: PgPool,
    withdrawal_repo: WithdrawalRepository,
    gateway: Arc<dyn PaymentGatewayClient>,
    events: EventDispatcher,
    config: WithdrawalConfig,
}

impl WithdrawalWorkflow {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn PaymentGatewayClient>,
        events: EventDispatcher,
        config: WithdrawalConfig,
    ) -> Self {
        Self {
            withdrawal_repo: WithdrawalRepository::new(pool.clone()),
            pool,
            gateway,
            events,
            config,
        }
    }

    /// Creates a pending request and earmarks the funds. The funds-locked
    /// debit transaction is created alongside; it becomes the payout debit
    /// when the request is processed.
    #[instrument(skip(self), fields(%user_id, %amount))]
    pub async fn create(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payout_reference: &str,
    ) -> Result<WithdrawalRequest> {
        if amount < self.config.minimum_amount {
            return Err(AppError::Validation(format!(
                "withdrawal amount {} is below the minimum of {}",
                amount, self.config.minimum_amount
            )));
        }
        if payout_reference.trim().is_empty() {
            return Err(AppError::Validation(
                "a payout destination is required".to_string(),
            ));
        }

        let mut db = self.begin().await?;

        let wallet = WalletRepository::lock_by_user_for_update(&mut *db, user_id).await?;
        WalletStore::lock_in_tx(&mut *db, wallet.id, amount).await?;

        let debit = Transaction::withdrawal_debit(
            generate_reference(PaymentPurpose::WithdrawalPayout),
            user_id,
            wallet.id,
            amount,
            wallet.currency.clone(),
        );
        let debit = TransactionRepository::create_in_tx(&mut *db, &debit).await?;

        let request = WithdrawalRequest::new(user_id, wallet.id, amount, payout_reference)
            .with_transaction(debit.id);
        let request = WithdrawalRepository::create_in_tx(&mut *db, &request).await?;

        db.commit().await.map_err(AppError::from_sqlx)?;

        info!(
            withdrawal_id = %request.id,
            wallet_id = %wallet.id,
            amount = %amount,
            "withdrawal requested; funds locked"
        );
        Ok(request)
    }

    /// Reviewer approval. The funds lock stays in place.
    #[instrument(skip(self), fields(%id, %reviewer))]
    pub async fn approve(&self, id: Uuid, reviewer: Uuid) -> Result<WithdrawalRequest> {
        let mut db = self.begin().await?;

        let mut request = WithdrawalRepository::find_by_id_for_update(&mut *db, id).await?;
        request.approve(reviewer)?;
        let request = WithdrawalRepository::update_in_tx(&mut *db, &request).await?;

        db.commit().await.map_err(AppError::from_sqlx)?;
        Ok(request)
    }

    /// Reviewer rejection. Requires a non-empty reason; releases the lock and
    /// terminalizes the earmark transaction.
    #[instrument(skip(self, reason), fields(%id, %reviewer))]
    pub async fn reject(&self, id: Uuid, reviewer: Uuid, reason: &str) -> Result<WithdrawalRequest> {
        self.release_with(id, move |request| request.reject(reviewer, reason))
            .await
    }

    /// Owner cancellation, permitted only while pending.
    #[instrument(skip(self), fields(%id, %owner))]
    pub async fn cancel(&self, id: Uuid, owner: Uuid) -> Result<WithdrawalRequest> {
        self.release_with(id, move |request| request.cancel(owner)).await
    }

    /// Shared exit path for reject/cancel: wallet lock first, then the
    /// request row, then unlock the funds and fail the earmark transaction.
    async fn release_with<F>(&self, id: Uuid, transition: F) -> Result<WithdrawalRequest>
    where
        F: FnOnce(&mut WithdrawalRequest) -> Result<()>,
    {
        let preview = self
            .withdrawal_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("withdrawal request '{}'", id)))?;

        let mut db = self.begin().await?;

        WalletRepository::lock_for_update(&mut *db, preview.wallet_id).await?;
        let mut request = WithdrawalRepository::find_by_id_for_update(&mut *db, id).await?;
        transition(&mut request)?;

        WalletStore::unlock_in_tx(&mut *db, request.wallet_id, request.amount).await?;
        if let Some(transaction_id) = request.transaction_id {
            TransactionRepository::transition_status_in_tx(
                &mut *db,
                transaction_id,
                TransactionStatus::Locked,
                TransactionStatus::Failed,
            )
            .await?;
        }
        let request = WithdrawalRepository::update_in_tx(&mut *db, &request).await?;

        db.commit().await.map_err(AppError::from_sqlx)?;

        info!(
            withdrawal_id = %request.id,
            status = ?request.status,
            "withdrawal released; funds unlocked"
        );
        Ok(request)
    }

    /// Initiates the payout for an approved request.
    ///
    /// On an accepted transfer the wallet is debited (lock released, ledger
    /// reduced) and the request stays `processing` until the gateway's
    /// transfer webhook terminalizes it. If the initiation itself fails the
    /// funds are unlocked and the request is marked failed; the wallet is
    /// never debited.
    #[instrument(skip(self), fields(%id))]
    pub async fn process(&self, id: Uuid) -> Result<WithdrawalRequest> {
        let request = {
            let mut db = self.begin().await?;
            let mut request = WithdrawalRepository::find_by_id_for_update(&mut *db, id).await?;
            request.begin_processing()?;
            let request = WithdrawalRepository::update_in_tx(&mut *db, &request).await?;
            db.commit().await.map_err(AppError::from_sqlx)?;
            request
        };

        let transaction_id = request.transaction_id.ok_or_else(|| {
            AppError::Validation(format!(
                "withdrawal '{}' has no backing transaction",
                request.id
            ))
        })?;
        let debit = TransactionRepository::new(self.pool.clone())
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction '{}'", transaction_id)))?;

        // The external call happens outside any database lock; the ledger
        // moves only after the gateway accepts the transfer.
        let transfer = self
            .gateway
            .initiate_transfer(
                &debit.external_reference,
                request.amount,
                &request.payout_reference,
                &debit.narration,
            )
            .await;

        match transfer {
            Ok(receipt) => {
                let mut db = self.begin().await?;
                WalletRepository::lock_for_update(&mut *db, request.wallet_id).await?;
                WalletStore::unlock_in_tx(&mut *db, request.wallet_id, request.amount).await?;
                WalletStore::debit_in_tx(
                    &mut *db,
                    request.wallet_id,
                    request.amount,
                    &debit.external_reference,
                )
                .await?;
                TransactionRepository::transition_status_in_tx(
                    &mut *db,
                    debit.id,
                    TransactionStatus::Locked,
                    TransactionStatus::Pending,
                )
                .await?;
                db.commit().await.map_err(AppError::from_sqlx)?;

                info!(
                    withdrawal_id = %request.id,
                    reference = %debit.external_reference,
                    transfer_code = %receipt.transfer_code,
                    "payout transfer initiated; awaiting gateway confirmation"
                );
                Ok(request)
            }
            Err(gateway_err) => {
                warn!(
                    withdrawal_id = %request.id,
                    reference = %debit.external_reference,
                    "payout initiation failed; restoring funds: {gateway_err}"
                );

                let mut db = self.begin().await?;
                WalletRepository::lock_for_update(&mut *db, request.wallet_id).await?;
                let mut request = WithdrawalRepository::find_by_id_for_update(&mut *db, id).await?;
                request.fail()?;
                WalletStore::unlock_in_tx(&mut *db, request.wallet_id, request.amount).await?;
                TransactionRepository::transition_status_in_tx(
                    &mut *db,
                    debit.id,
                    TransactionStatus::Locked,
                    TransactionStatus::Failed,
                )
                .await?;
                let request = WithdrawalRepository::update_in_tx(&mut *db, &request).await?;
                db.commit().await.map_err(AppError::from_sqlx)?;

                self.events
                    .emit(OutboundEvent::Withdrawal(EventEnvelope::new(
                        EventType::WithdrawalFailed,
                        WithdrawalEvent {
                            withdrawal_id: request.id,
                            user_id: request.user_id,
                            amount: request.amount,
                            reference: Some(debit.external_reference.clone()),
                        },
                    )));
                Ok(request)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<WithdrawalRequest> {
        self.withdrawal_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("withdrawal request '{}'", id)))
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>> {
        self.withdrawal_repo
            .list_by_user(user_id, status, limit, offset)
            .await
    }

    pub async fn list_by_status(
        &self,
        status: WithdrawalStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>> {
        self.withdrawal_repo.list_by_status(status, limit, offset).await
    }

    /// Aggregate counts and amounts by status.
    pub async fn stats(&self) -> Result<Vec<WithdrawalStatusStat>> {
        self.withdrawal_repo.stats().await
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Postgres>> {
        let mut db = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        WalletRepository::set_lock_timeout(&mut *db, self.config.lock_timeout_ms).await?;
        Ok(db)
    }
}
