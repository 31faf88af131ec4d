pub mod split_repository;
pub mod transaction_repository;
pub mod wallet_repository;
pub mod withdrawal_repository;

pub use split_repository::SplitRepository;
pub use transaction_repository::TransactionRepository;
pub use wallet_repository::WalletRepository;
pub use withdrawal_repository::WithdrawalRepository;

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
