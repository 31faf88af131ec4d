use crate::error::{AppError, Result};
use crate::models::{WithdrawalRequest, WithdrawalStatus, WithdrawalStatusStat};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const WITHDRAWAL_COLUMNS: &str = "id, user_id, wallet_id, amount, payout_reference, status, reviewed_by, reviewed_at, rejection_reason, transaction_id, created_at, updated_at";

/// Repository for withdrawal requests.
pub struct WithdrawalRepository {
    pool: PgPool,
}

impl WithdrawalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_in_tx(
        conn: &mut PgConnection,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRequest> {
        let row = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            INSERT INTO withdrawal_requests (id, user_id, wallet_id, amount, payout_reference, status, reviewed_by, reviewed_at, rejection_reason, transaction_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {WITHDRAWAL_COLUMNS}
            "#,
        ))
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.wallet_id)
        .bind(request.amount)
        .bind(&request.payout_reference)
        .bind(request.status)
        .bind(request.reviewed_by)
        .bind(request.reviewed_at)
        .bind(&request.rejection_reason)
        .bind(request.transaction_id)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Reads a request under a row lock so reviewer actions and processing
    /// cannot interleave.
    pub async fn find_by_id_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<WithdrawalRequest> {
        let row = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = $1 FOR UPDATE",
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        row.ok_or_else(|| AppError::NotFound(format!("withdrawal request '{}'", id)))
    }

    /// The request backing a payout debit transaction, locked for update.
    pub async fn find_by_transaction_for_update(
        conn: &mut PgConnection,
        transaction_id: Uuid,
    ) -> Result<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE transaction_id = $1 FOR UPDATE",
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Persists the full mutable state of a request inside the caller's
    /// transaction.
    pub async fn update_in_tx(
        conn: &mut PgConnection,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRequest> {
        let row = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            UPDATE withdrawal_requests
            SET status = $2,
                reviewed_by = $3,
                reviewed_at = $4,
                rejection_reason = $5,
                transaction_id = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING {WITHDRAWAL_COLUMNS}
            "#,
        ))
        .bind(request.id)
        .bind(request.status)
        .bind(request.reviewed_by)
        .bind(request.reviewed_at)
        .bind(&request.rejection_reason)
        .bind(request.transaction_id)
        .bind(request.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>> {
        let rows = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS}
            FROM withdrawal_requests
            WHERE user_id = $1
              AND ($2::withdrawal_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(user_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }

    pub async fn list_by_status(
        &self,
        status: WithdrawalStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WithdrawalRequest>> {
        let rows = sqlx::query_as::<_, WithdrawalRequest>(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS}
            FROM withdrawal_requests
            WHERE status = $1
            ORDER BY created_at
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }

    /// Aggregate counts and amounts grouped by status.
    pub async fn stats(&self) -> Result<Vec<WithdrawalStatusStat>> {
        let rows = sqlx::query_as::<_, WithdrawalStatusStat>(
            r#"
            SELECT status, COUNT(*) AS request_count, COALESCE(SUM(amount), 0) AS total_amount
            FROM withdrawal_requests
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }
}
