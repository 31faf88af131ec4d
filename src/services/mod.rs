pub mod payment_service;
pub mod reconciliation;
pub mod revenue_splitter;
pub mod wallet_store;
pub mod withdrawal_service;

pub use payment_service::{generate_reference, InitiationRequest, PaymentService};
pub use reconciliation::{ReconciliationConfig, ReconciliationEngine, ReconciliationOutcome};
pub use revenue_splitter::RevenueSplitter;
pub use wallet_store::WalletStore;
pub use withdrawal_service::{WithdrawalConfig, WithdrawalWorkflow};
