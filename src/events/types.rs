use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TransactionStatus;

/// Kind of domain event emitted after a ledger state change commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    WalletCredited,
    WalletDebited,
    PaymentReconciled,
    RevenueSplitApplied,
    WithdrawalCompleted,
    WithdrawalFailed,
}

/// Envelope wrapping all events with common metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub payload: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(event_type: EventType, payload: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            source: "wallet-ledger".to_string(),
            payload,
        }
    }
}

/// Payload for wallet balance movements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEvent {
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub reference: String,
}

/// Payload for reconciled gateway payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationEvent {
    pub reference: String,
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub related_entity_id: Option<Uuid>,
}

/// Payload for applied revenue splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitEvent {
    pub transaction_id: Uuid,
    pub dealer_wallet_id: Uuid,
    pub dealer_amount: Decimal,
    pub platform_amount: Decimal,
}

/// Payload for terminal withdrawal outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub withdrawal_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub reference: Option<String>,
}

/// Union of all outbound events carried on the dispatch channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundEvent {
    Wallet(EventEnvelope<WalletEvent>),
    Reconciliation(EventEnvelope<ReconciliationEvent>),
    Split(EventEnvelope<SplitEvent>),
    Withdrawal(EventEnvelope<WithdrawalEvent>),
}
