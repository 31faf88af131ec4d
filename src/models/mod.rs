pub mod revenue_split;
pub mod transaction;
pub mod wallet;
pub mod withdrawal;

pub use revenue_split::{RevenueSplit, RevenueSplitSettings};
pub use transaction::{
    PaymentPurpose, Transaction, TransactionSource, TransactionStateMachine, TransactionStatus,
    TransactionType,
};
pub use wallet::Wallet;
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus, WithdrawalStatusStat};
