use crate::error::{AppError, Result};
use crate::models::Wallet;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const WALLET_COLUMNS: &str =
    "id, user_id, currency, ledger_balance, locked_amount, version, created_at, updated_at";

/// Repository for wallet rows. Mutations happen through `lock_for_update` +
/// `save_balances` inside a caller-owned database transaction; the row lock
/// serializes all balance changes for one wallet.
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a wallet. One wallet exists per user; a second insert for the
    /// same user fails on the unique constraint.
    pub async fn create(&self, wallet: &Wallet) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            INSERT INTO wallets (id, user_id, currency, ledger_balance, locked_amount, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {WALLET_COLUMNS}
            "#,
        ))
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(&wallet.currency)
        .bind(wallet.ledger_balance)
        .bind(wallet.locked_amount)
        .bind(wallet.version)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Validation(format!("wallet already exists for user {}", wallet.user_id))
            } else {
                AppError::from_sqlx(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1",
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Bounds row-lock acquisition for the current transaction. Exceeding the
    /// timeout surfaces SQLSTATE 55P03, classified as a retryable conflict.
    pub async fn set_lock_timeout(conn: &mut PgConnection, timeout_ms: u64) -> Result<()> {
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", timeout_ms))
            .execute(conn)
            .await
            .map_err(AppError::from_sqlx)?;
        Ok(())
    }

    /// Acquires the exclusive row lock for a wallet within the caller's
    /// transaction and returns the current state. All balance mutations for
    /// this wallet queue behind the lock until the transaction ends.
    pub async fn lock_for_update(conn: &mut PgConnection, wallet_id: Uuid) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1 FOR UPDATE",
        ))
        .bind(wallet_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        row.ok_or_else(|| AppError::NotFound(format!("wallet '{}'", wallet_id)))
    }

    /// Same as `lock_for_update` but addressed by owner.
    pub async fn lock_by_user_for_update(conn: &mut PgConnection, user_id: Uuid) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE",
        ))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        row.ok_or_else(|| AppError::NotFound(format!("wallet for user '{}'", user_id)))
    }

    /// Writes back mutated balances under the lock taken by
    /// `lock_for_update`. The database check constraint is the last line of
    /// defense for `available_balance >= 0`.
    pub async fn save_balances(conn: &mut PgConnection, wallet: &Wallet) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET ledger_balance = $2,
                locked_amount = $3,
                version = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING {WALLET_COLUMNS}
            "#,
        ))
        .bind(wallet.id)
        .bind(wallet.ledger_balance)
        .bind(wallet.locked_amount)
        .bind(wallet.version)
        .bind(wallet.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }
}
