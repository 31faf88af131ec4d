use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Type of monetary movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Inbound funds from the gateway into a wallet.
    Deposit,
    /// Outbound payout from a wallet to an external account.
    Withdraw,
    TransferIn,
    TransferOut,
    /// A customer payment for a marketplace entity (inspection, booking).
    Payment,
    /// A fee charged against a wallet.
    Charge,
}

/// Status of a transaction in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Funds earmarked for an outbound payout not yet initiated.
    Locked,
    /// Awaiting gateway settlement.
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl TransactionStatus {
    /// Returns true once the transaction has been reconciled. A terminal
    /// transaction never transitions again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Reversed
        )
    }
}

/// Origin of the funds movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_source", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    Wallet,
    ExternalGateway,
}

/// What a gateway payment was initiated for. Echoed back by the gateway in
/// event metadata; unknown strings fail deserialization so new purposes must
/// be handled explicitly before they can flow through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_purpose", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "kebab-case")]
pub enum PaymentPurpose {
    /// Direct wallet top-up paid at the gateway.
    WalletFunding,
    /// Inspection fee, split between the dealer and the platform.
    InspectionPayment,
    /// Booking payment credited in full to the beneficiary.
    BookingPayment,
    /// Outbound withdrawal transfer.
    WithdrawalPayout,
}

impl PaymentPurpose {
    /// Purposes that may create their own ledger record when a settlement
    /// arrives with no prior transaction (e.g. a top-up initiated on the
    /// gateway's hosted page).
    pub fn is_self_initiating(&self) -> bool {
        matches!(self, PaymentPurpose::WalletFunding)
    }

    /// Purposes whose completed payment is divided between the dealer and
    /// the platform.
    pub fn is_split_bearing(&self) -> bool {
        matches!(self, PaymentPurpose::InspectionPayment)
    }
}

/// Enforces monotonic status transitions: a transaction is reconciled by at
/// most one terminal transition and never moves backward.
#[derive(Debug, Clone)]
pub struct TransactionStateMachine;

impl TransactionStateMachine {
    pub fn valid_transitions(current: TransactionStatus) -> Vec<TransactionStatus> {
        match current {
            TransactionStatus::Locked => {
                vec![TransactionStatus::Pending, TransactionStatus::Failed]
            }
            TransactionStatus::Pending => vec![
                TransactionStatus::Completed,
                TransactionStatus::Failed,
                TransactionStatus::Reversed,
            ],
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::Reversed => vec![],
        }
    }

    pub fn can_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
        Self::valid_transitions(from).contains(&to)
    }

    pub fn transition(from: TransactionStatus, to: TransactionStatus) -> Result<TransactionStatus> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(AppError::Validation(format!(
                "invalid status transition from {:?} to {:?}",
                from, to
            )))
        }
    }
}

/// A single monetary movement in the ledger, keyed by a globally unique
/// `external_reference` supplied at initiation and echoed by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub external_reference: String,
    #[sqlx(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub source: TransactionSource,
    pub amount: Decimal,
    pub currency: String,
    pub sender_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub purpose: Option<PaymentPurpose>,
    /// Marketplace entity (inspection, booking, order) this payment settles.
    pub related_entity_id: Option<Uuid>,
    pub narration: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    fn base(
        external_reference: String,
        transaction_type: TransactionType,
        status: TransactionStatus,
        source: TransactionSource,
        amount: Decimal,
        currency: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_reference,
            transaction_type,
            status,
            source,
            amount,
            currency,
            sender_id: None,
            recipient_id: None,
            wallet_id: None,
            purpose: None,
            related_entity_id: None,
            narration: String::new(),
            metadata: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Pending wallet top-up awaiting gateway settlement.
    pub fn funding(
        external_reference: impl Into<String>,
        user_id: Uuid,
        wallet_id: Uuid,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let mut tx = Self::base(
            external_reference.into(),
            TransactionType::Deposit,
            TransactionStatus::Pending,
            TransactionSource::ExternalGateway,
            amount,
            currency.into(),
        );
        tx.recipient_id = Some(user_id);
        tx.wallet_id = Some(wallet_id);
        tx.purpose = Some(PaymentPurpose::WalletFunding);
        tx.narration = "wallet funding".to_string();
        tx
    }

    /// Pending customer payment for a marketplace entity.
    pub fn gateway_payment(
        external_reference: impl Into<String>,
        purpose: PaymentPurpose,
        payer_id: Uuid,
        beneficiary_id: Option<Uuid>,
        related_entity_id: Option<Uuid>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let mut tx = Self::base(
            external_reference.into(),
            TransactionType::Payment,
            TransactionStatus::Pending,
            TransactionSource::ExternalGateway,
            amount,
            currency.into(),
        );
        tx.sender_id = Some(payer_id);
        tx.recipient_id = beneficiary_id;
        tx.related_entity_id = related_entity_id;
        tx.purpose = Some(purpose);
        tx
    }

    /// Funds-locked withdrawal debit. Becomes pending once the payout
    /// transfer is initiated.
    pub fn withdrawal_debit(
        external_reference: impl Into<String>,
        user_id: Uuid,
        wallet_id: Uuid,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let mut tx = Self::base(
            external_reference.into(),
            TransactionType::Withdraw,
            TransactionStatus::Locked,
            TransactionSource::Wallet,
            amount,
            currency.into(),
        );
        tx.sender_id = Some(user_id);
        tx.wallet_id = Some(wallet_id);
        tx.purpose = Some(PaymentPurpose::WithdrawalPayout);
        tx.narration = "wallet withdrawal".to_string();
        tx
    }

    /// Compensating credit issued when a previously-debited transfer is
    /// reported failed or reversed by the gateway.
    pub fn compensating_credit(original: &Transaction, reference: impl Into<String>) -> Self {
        let mut tx = Self::base(
            reference.into(),
            TransactionType::TransferIn,
            TransactionStatus::Completed,
            TransactionSource::ExternalGateway,
            original.amount,
            original.currency.clone(),
        );
        tx.recipient_id = original.sender_id;
        tx.wallet_id = original.wallet_id;
        tx.related_entity_id = original.related_entity_id;
        tx.narration = format!("reversal of {}", original.external_reference);
        tx.completed_at = Some(Utc::now());
        tx
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = narration.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_terminality() {
        assert!(!TransactionStatus::Locked.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Reversed.is_terminal());
    }

    #[test]
    fn test_state_machine_forward_only() {
        assert!(TransactionStateMachine::can_transition(
            TransactionStatus::Locked,
            TransactionStatus::Pending
        ));
        assert!(TransactionStateMachine::can_transition(
            TransactionStatus::Pending,
            TransactionStatus::Completed
        ));
        assert!(TransactionStateMachine::can_transition(
            TransactionStatus::Pending,
            TransactionStatus::Reversed
        ));

        // No backward or post-terminal transitions.
        assert!(!TransactionStateMachine::can_transition(
            TransactionStatus::Completed,
            TransactionStatus::Pending
        ));
        assert!(!TransactionStateMachine::can_transition(
            TransactionStatus::Failed,
            TransactionStatus::Completed
        ));
        assert!(!TransactionStateMachine::can_transition(
            TransactionStatus::Reversed,
            TransactionStatus::Pending
        ));
        assert!(!TransactionStateMachine::can_transition(
            TransactionStatus::Locked,
            TransactionStatus::Completed
        ));
    }

    #[test]
    fn test_transition_error_message() {
        let err = TransactionStateMachine::transition(
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid status transition"));
    }

    #[test]
    fn test_purpose_dispatch_flags() {
        assert!(PaymentPurpose::WalletFunding.is_self_initiating());
        assert!(!PaymentPurpose::InspectionPayment.is_self_initiating());
        assert!(PaymentPurpose::InspectionPayment.is_split_bearing());
        assert!(!PaymentPurpose::BookingPayment.is_split_bearing());
        assert!(!PaymentPurpose::WithdrawalPayout.is_split_bearing());
    }

    #[test]
    fn test_purpose_wire_format() {
        let json = serde_json::to_string(&PaymentPurpose::InspectionPayment).unwrap();
        assert_eq!(json, "\"inspection-payment\"");

        // Unknown purposes fail closed instead of falling through.
        let unknown: std::result::Result<PaymentPurpose, _> =
            serde_json::from_str("\"loyalty-cashback\"");
        assert!(unknown.is_err());
    }

    #[test]
    fn test_funding_builder() {
        let user = Uuid::new_v4();
        let wallet = Uuid::new_v4();
        let tx = Transaction::funding("FND-001", user, wallet, dec!(5000), "NGN");

        assert_eq!(tx.transaction_type, TransactionType::Deposit);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.source, TransactionSource::ExternalGateway);
        assert_eq!(tx.recipient_id, Some(user));
        assert_eq!(tx.wallet_id, Some(wallet));
        assert_eq!(tx.purpose, Some(PaymentPurpose::WalletFunding));
    }

    #[test]
    fn test_withdrawal_debit_starts_locked() {
        let tx = Transaction::withdrawal_debit(
            "WTH-001",
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(2500),
            "NGN",
        );
        assert_eq!(tx.status, TransactionStatus::Locked);
        assert_eq!(tx.transaction_type, TransactionType::Withdraw);
        assert_eq!(tx.source, TransactionSource::Wallet);
    }

    #[test]
    fn test_compensating_credit_mirrors_original() {
        let original = Transaction::withdrawal_debit(
            "WTH-002",
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(2500),
            "NGN",
        );
        let credit = Transaction::compensating_credit(&original, "WTH-002-REV");

        assert_eq!(credit.amount, dec!(2500));
        assert_eq!(credit.wallet_id, original.wallet_id);
        assert_eq!(credit.recipient_id, original.sender_id);
        assert_eq!(credit.status, TransactionStatus::Completed);
        assert!(credit.narration.contains("WTH-002"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let tx = Transaction::gateway_payment(
            "INS-001",
            PaymentPurpose::InspectionPayment,
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
            dec!(5000),
            "NGN",
        );
        let json = serde_json::to_string(&tx).unwrap();
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.external_reference, tx.external_reference);
        assert_eq!(deserialized.amount, dec!(5000));
        assert_eq!(deserialized.purpose, Some(PaymentPurpose::InspectionPayment));
    }
}
