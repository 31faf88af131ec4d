use crate::error::{AppError, Result};
use crate::events::{EventDispatcher, EventEnvelope, EventType, OutboundEvent, SplitEvent};
use crate::models::{RevenueSplit, RevenueSplitSettings, Transaction};
use crate::repositories::{SplitRepository, WalletRepository};
use crate::services::wallet_store::WalletStore;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info, warn};

/// Divides a completed split-bearing payment between the dealer and the
/// platform.
///
/// The dealer share is credited through the wallet store under the dealer
/// wallet's own row lock; the platform share is the retained remainder and is
/// recorded, not moved. The unique constraint on the source transaction makes
/// re-entry a no-op.
pub struct RevenueSplitter {
    pool: PgPool,
    split_repo: SplitRepository,
    events: EventDispatcher,
}

impl RevenueSplitter {
    pub fn new(pool: PgPool, events: EventDispatcher) -> Self {
        Self {
            split_repo: SplitRepository::new(pool.clone()),
            pool,
            events,
        }
    }

    /// Applies the split inside the caller's transaction, so it commits or
    /// rolls back together with the payment's terminal transition.
    pub async fn split_in_tx(
        &self,
        conn: &mut PgConnection,
        transaction: &Transaction,
    ) -> Result<RevenueSplit> {
        let settings = match SplitRepository::active_settings_in_tx(conn).await? {
            Some(settings) => settings,
            None => {
                warn!(
                    reference = %transaction.external_reference,
                    "no active revenue split settings; falling back to the default split"
                );
                RevenueSplitSettings::default_split()
            }
        };

        if let Err(e) = settings.validate() {
            error!(
                reference = %transaction.external_reference,
                dealer_percentage = %settings.dealer_percentage,
                platform_percentage = %settings.platform_percentage,
                "active revenue split settings are invalid"
            );
            return Err(e);
        }

        let dealer_id = transaction.recipient_id.ok_or_else(|| {
            AppError::Validation(format!(
                "transaction '{}' has no beneficiary to credit",
                transaction.external_reference
            ))
        })?;
        let dealer_wallet = WalletRepository::lock_by_user_for_update(conn, dealer_id).await?;

        let split = RevenueSplit::compute(
            transaction.id,
            dealer_wallet.id,
            transaction.amount,
            &settings,
        )?;

        // Insert before crediting: the unique constraint on transaction_id is
        // what stops a concurrent re-entry from crediting the dealer twice.
        let split = match SplitRepository::create_in_tx(conn, &split).await {
            Ok(split) => split,
            Err(AppError::DuplicateEvent(_)) => {
                info!(
                    transaction_id = %transaction.id,
                    "revenue split already recorded; skipping"
                );
                return self
                    .split_repo
                    .find_by_transaction(transaction.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("split for transaction '{}'", transaction.id))
                    });
            }
            Err(e) => return Err(e),
        };

        WalletStore::credit_in_tx(
            conn,
            dealer_wallet.id,
            split.dealer_amount,
            &transaction.external_reference,
        )
        .await?;
        let split = SplitRepository::mark_dealer_credited_in_tx(conn, split.id).await?;

        info!(
            transaction_id = %transaction.id,
            dealer_wallet_id = %split.dealer_wallet_id,
            dealer_amount = %split.dealer_amount,
            platform_amount = %split.platform_amount,
            "revenue split applied"
        );
        self.events
            .emit(OutboundEvent::Split(EventEnvelope::new(
                EventType::RevenueSplitApplied,
                SplitEvent {
                    transaction_id: split.transaction_id,
                    dealer_wallet_id: split.dealer_wallet_id,
                    dealer_amount: split.dealer_amount,
                    platform_amount: split.platform_amount,
                },
            )));

        Ok(split)
    }

    /// Standalone entry point for manual re-runs: wraps `split_in_tx` in its
    /// own transaction.
    pub async fn split(&self, transaction: &Transaction) -> Result<RevenueSplit> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        let split = self.split_in_tx(&mut *tx, transaction).await?;
        tx.commit().await.map_err(AppError::from_sqlx)?;
        Ok(split)
    }

    /// Split recorded for a transaction, if one exists.
    pub async fn find_by_transaction(
        &self,
        transaction_id: uuid::Uuid,
    ) -> Result<Option<RevenueSplit>> {
        self.split_repo.find_by_transaction(transaction_id).await
    }

    /// Split exposure for the marketplace entity the payment settled.
    pub async fn find_by_related_entity(
        &self,
        related_id: uuid::Uuid,
    ) -> Result<Option<RevenueSplit>> {
        self.split_repo.find_by_related_entity(related_id).await
    }
}
