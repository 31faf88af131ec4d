use crate::error::{AppError, Result};
use crate::models::{RevenueSplit, RevenueSplitSettings};
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for revenue split settings and recorded splits.
pub struct SplitRepository {
    pool: PgPool,
}

impl SplitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the single active settings row, if any.
    pub async fn active_settings(&self) -> Result<Option<RevenueSplitSettings>> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from_sqlx)?;
        Self::active_settings_in_tx(&mut *conn).await
    }

    pub async fn active_settings_in_tx(
        conn: &mut PgConnection,
    ) -> Result<Option<RevenueSplitSettings>> {
        let row = sqlx::query_as::<_, RevenueSplitSettings>(
            r#"
            SELECT id, dealer_percentage, platform_percentage, is_active, effective_from, created_at
            FROM revenue_split_settings
            WHERE is_active
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Activates a new settings version. Deactivating every other row and
    /// inserting the new active one happen in one database transaction, so
    /// there is never a moment with zero or two active rows.
    pub async fn activate_settings(
        &self,
        settings: &RevenueSplitSettings,
    ) -> Result<RevenueSplitSettings> {
        settings.validate()?;

        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;

        sqlx::query("UPDATE revenue_split_settings SET is_active = FALSE WHERE is_active")
            .execute(&mut *tx)
            .await
            .map_err(AppError::from_sqlx)?;

        let row = sqlx::query_as::<_, RevenueSplitSettings>(
            r#"
            INSERT INTO revenue_split_settings (id, dealer_percentage, platform_percentage, is_active, effective_from, created_at)
            VALUES ($1, $2, $3, TRUE, $4, $5)
            RETURNING id, dealer_percentage, platform_percentage, is_active, effective_from, created_at
            "#,
        )
        .bind(settings.id)
        .bind(settings.dealer_percentage)
        .bind(settings.platform_percentage)
        .bind(settings.effective_from)
        .bind(settings.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_sqlx)?;

        tx.commit().await.map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Inserts a split row inside the caller's transaction. The unique
    /// constraint on `transaction_id` makes re-entry a `DuplicateEvent`.
    pub async fn create_in_tx(conn: &mut PgConnection, split: &RevenueSplit) -> Result<RevenueSplit> {
        let row = sqlx::query_as::<_, RevenueSplit>(
            r#"
            INSERT INTO revenue_splits (id, transaction_id, total_amount, dealer_amount, platform_amount, dealer_percentage, platform_percentage, dealer_wallet_id, dealer_credited, dealer_credited_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, transaction_id, total_amount, dealer_amount, platform_amount, dealer_percentage, platform_percentage, dealer_wallet_id, dealer_credited, dealer_credited_at, created_at
            "#,
        )
        .bind(split.id)
        .bind(split.transaction_id)
        .bind(split.total_amount)
        .bind(split.dealer_amount)
        .bind(split.platform_amount)
        .bind(split.dealer_percentage)
        .bind(split.platform_percentage)
        .bind(split.dealer_wallet_id)
        .bind(split.dealer_credited)
        .bind(split.dealer_credited_at)
        .bind(split.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::DuplicateEvent(split.transaction_id.to_string())
            } else {
                AppError::from_sqlx(e)
            }
        })?;

        Ok(row)
    }

    /// Flags the dealer share as credited inside the caller's transaction.
    pub async fn mark_dealer_credited_in_tx(
        conn: &mut PgConnection,
        split_id: Uuid,
    ) -> Result<RevenueSplit> {
        let row = sqlx::query_as::<_, RevenueSplit>(
            r#"
            UPDATE revenue_splits
            SET dealer_credited = TRUE, dealer_credited_at = $2
            WHERE id = $1
            RETURNING id, transaction_id, total_amount, dealer_amount, platform_amount, dealer_percentage, platform_percentage, dealer_wallet_id, dealer_credited, dealer_credited_at, created_at
            "#,
        )
        .bind(split_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn find_by_transaction(&self, transaction_id: Uuid) -> Result<Option<RevenueSplit>> {
        let row = sqlx::query_as::<_, RevenueSplit>(
            r#"
            SELECT id, transaction_id, total_amount, dealer_amount, platform_amount, dealer_percentage, platform_percentage, dealer_wallet_id, dealer_credited, dealer_credited_at, created_at
            FROM revenue_splits
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Split recorded for the payment that settled a marketplace entity.
    pub async fn find_by_related_entity(&self, related_id: Uuid) -> Result<Option<RevenueSplit>> {
        let row = sqlx::query_as::<_, RevenueSplit>(
            r#"
            SELECT s.id, s.transaction_id, s.total_amount, s.dealer_amount, s.platform_amount, s.dealer_percentage, s.platform_percentage, s.dealer_wallet_id, s.dealer_credited, s.dealer_credited_at, s.created_at
            FROM revenue_splits s
            JOIN transactions t ON t.id = s.transaction_id
            WHERE t.related_entity_id = $1
            "#,
        )
        .bind(related_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }
}
