use crate::error::{AppError, Result};
use crate::models::Wallet;
use crate::repositories::WalletRepository;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

/// Authoritative wallet balance store.
///
/// Every mutating operation is an explicit, named step — `credit`, `debit`,
/// `lock`, `unlock` — that owns its lock scope: acquire the wallet row lock,
/// mutate, validate the invariant, write back, release on commit or rollback.
/// Nothing mutates a balance as a side effect of saving another record.
///
/// The `*_in_tx` variants run inside a caller-owned transaction so the balance
/// change and the associated transaction write commit or roll back together.
pub struct WalletStore {
    pool: PgPool,
    wallet_repo: WalletRepository,
}

impl WalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallet_repo: WalletRepository::new(pool.clone()),
            pool,
        }
    }

    /// Creates the wallet for an account. Called once at account setup.
    pub async fn open_wallet(&self, user_id: Uuid, currency: &str) -> Result<Wallet> {
        self.wallet_repo
            .create(&Wallet::new(user_id, currency))
            .await
    }

    /// Current balances. Reads outside the lock; callers needing a stable
    /// view for a mutation use the `*_in_tx` operations instead.
    pub async fn balance(&self, wallet_id: Uuid) -> Result<Wallet> {
        self.wallet_repo
            .find_by_id(wallet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet '{}'", wallet_id)))
    }

    pub async fn balance_for_user(&self, user_id: Uuid) -> Result<Wallet> {
        self.wallet_repo
            .find_by_user_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet for user '{}'", user_id)))
    }

    #[instrument(skip(self), fields(%wallet_id, %amount, reference))]
    pub async fn credit(&self, wallet_id: Uuid, amount: Decimal, reference: &str) -> Result<Wallet> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        let wallet = Self::credit_in_tx(&mut *tx, wallet_id, amount, reference).await?;
        tx.commit().await.map_err(AppError::from_sqlx)?;
        Ok(wallet)
    }

    #[instrument(skip(self), fields(%wallet_id, %amount, reference))]
    pub async fn debit(&self, wallet_id: Uuid, amount: Decimal, reference: &str) -> Result<Wallet> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        let wallet = Self::debit_in_tx(&mut *tx, wallet_id, amount, reference).await?;
        tx.commit().await.map_err(AppError::from_sqlx)?;
        Ok(wallet)
    }

    #[instrument(skip(self), fields(%wallet_id, %amount))]
    pub async fn lock(&self, wallet_id: Uuid, amount: Decimal) -> Result<Wallet> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        let wallet = Self::lock_in_tx(&mut *tx, wallet_id, amount).await?;
        tx.commit().await.map_err(AppError::from_sqlx)?;
        Ok(wallet)
    }

    #[instrument(skip(self), fields(%wallet_id, %amount))]
    pub async fn unlock(&self, wallet_id: Uuid, amount: Decimal) -> Result<Wallet> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        let wallet = Self::unlock_in_tx(&mut *tx, wallet_id, amount).await?;
        tx.commit().await.map_err(AppError::from_sqlx)?;
        Ok(wallet)
    }

    /// Credit under the caller's transaction and the wallet's row lock.
    pub async fn credit_in_tx(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Wallet> {
        let mut wallet = WalletRepository::lock_for_update(conn, wallet_id).await?;
        wallet.credit(amount)?;
        let saved = WalletRepository::save_balances(conn, &wallet).await?;
        info!(
            wallet_id = %wallet_id,
            amount = %amount,
            reference,
            ledger_balance = %saved.ledger_balance,
            "wallet credited"
        );
        Ok(saved)
    }

    /// Debit under the caller's transaction and the wallet's row lock. Fails
    /// with the shortfall if the available balance cannot cover the amount.
    pub async fn debit_in_tx(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> Result<Wallet> {
        let mut wallet = WalletRepository::lock_for_update(conn, wallet_id).await?;
        wallet.debit(amount)?;
        let saved = WalletRepository::save_balances(conn, &wallet).await?;
        info!(
            wallet_id = %wallet_id,
            amount = %amount,
            reference,
            ledger_balance = %saved.ledger_balance,
            "wallet debited"
        );
        Ok(saved)
    }

    /// Earmarks funds for a pending withdrawal under the row lock.
    pub async fn lock_in_tx(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        amount: Decimal,
    ) -> Result<Wallet> {
        let mut wallet = WalletRepository::lock_for_update(conn, wallet_id).await?;
        wallet.lock_funds(amount)?;
        let saved = WalletRepository::save_balances(conn, &wallet).await?;
        info!(
            wallet_id = %wallet_id,
            amount = %amount,
            locked_amount = %saved.locked_amount,
            "wallet funds locked"
        );
        Ok(saved)
    }

    /// Releases earmarked funds under the row lock.
    pub async fn unlock_in_tx(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        amount: Decimal,
    ) -> Result<Wallet> {
        let mut wallet = WalletRepository::lock_for_update(conn, wallet_id).await?;
        wallet.unlock_funds(amount)?;
        let saved = WalletRepository::save_balances(conn, &wallet).await?;
        info!(
            wallet_id = %wallet_id,
            amount = %amount,
            locked_amount = %saved.locked_amount,
            "wallet funds unlocked"
        );
        Ok(saved)
    }
}
