use crate::error::{AppError, Result};
use crate::models::{Transaction, TransactionStateMachine, TransactionStatus};
use chrono::{Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for ledger transactions. `external_reference` is globally
/// unique; the unique constraint is what makes duplicate gateway deliveries
/// harmless.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, transaction: &Transaction) -> Result<Transaction> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from_sqlx)?;
        Self::create_in_tx(&mut *conn, transaction).await
    }

    /// Inserts a transaction inside the caller's transaction. A duplicate
    /// `external_reference` maps to `DuplicateEvent` so racing handlers can
    /// short-circuit instead of failing.
    pub async fn create_in_tx(
        conn: &mut PgConnection,
        transaction: &Transaction,
    ) -> Result<Transaction> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.external_reference)
        .bind(transaction.transaction_type)
        .bind(transaction.status)
        .bind(transaction.source)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.sender_id)
        .bind(transaction.recipient_id)
        .bind(transaction.wallet_id)
        .bind(transaction.purpose)
        .bind(transaction.related_entity_id)
        .bind(&transaction.narration)
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .bind(transaction.completed_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::DuplicateEvent(transaction.external_reference.clone())
            } else {
                AppError::from_sqlx(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            FROM transactions
            WHERE external_reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Reads a transaction by reference under a row lock, re-checking status
    /// after the wallet lock has been acquired. Always lock the wallet first;
    /// that ordering is what keeps concurrent handlers deadlock-free.
    pub async fn find_by_reference_for_update(
        conn: &mut PgConnection,
        reference: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            FROM transactions
            WHERE external_reference = $1
            FOR UPDATE
            "#,
        )
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Writes a status transition inside the caller's transaction. The WHERE
    /// clause pins the expected current status so a lost race surfaces as a
    /// conflict instead of a double transition.
    pub async fn transition_status_in_tx(
        conn: &mut PgConnection,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Transaction> {
        TransactionStateMachine::transition(from, to)?;
        let completed_at = if to.is_terminal() { Some(Utc::now()) } else { None };

        let row = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = $3, completed_at = COALESCE($4, completed_at)
            WHERE id = $1 AND status = $2
            RETURNING id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(completed_at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        row.ok_or_else(|| {
            AppError::ConcurrencyConflict(format!(
                "transaction '{}' left status {:?} before transition to {:?}",
                id, from, to
            ))
        })
    }

    pub async fn list_by_wallet(
        &self,
        wallet_id: Uuid,
        status: Option<TransactionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            FROM transactions
            WHERE wallet_id = $1
              AND ($2::transaction_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(wallet_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }

    pub async fn count_by_wallet(
        &self,
        wallet_id: Uuid,
        status: Option<TransactionStatus>,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE wallet_id = $1
              AND ($2::transaction_status IS NULL OR status = $2)
            "#,
        )
        .bind(wallet_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row.0)
    }

    /// Transactions stuck pending beyond `max_age_hours`, oldest first. The
    /// manual reconciliation queue.
    pub async fn find_stale_pending(
        &self,
        max_age_hours: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_reference, type, status, source, amount, currency, sender_id, recipient_id, wallet_id, purpose, related_entity_id, narration, metadata, created_at, completed_at
            FROM transactions
            WHERE status = 'PENDING' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }
}
