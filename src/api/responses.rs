use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    PaymentPurpose, RevenueSplit, Transaction, TransactionSource, TransactionStatus,
    TransactionType, Wallet, WithdrawalRequest, WithdrawalStatus, WithdrawalStatusStat,
};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: bool,
}

/// Wallet balance DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub ledger_balance: Decimal,
    pub locked_amount: Decimal,
    pub available_balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            user_id: wallet.user_id,
            available_balance: wallet.available_balance(),
            currency: wallet.currency,
            ledger_balance: wallet.ledger_balance,
            locked_amount: wallet.locked_amount,
            updated_at: wallet.updated_at,
        }
    }
}

/// Transaction DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub reference: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub source: TransactionSource,
    pub amount: Decimal,
    pub currency: String,
    pub purpose: Option<PaymentPurpose>,
    pub related_entity_id: Option<Uuid>,
    pub narration: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            reference: tx.external_reference,
            transaction_type: tx.transaction_type,
            status: tx.status,
            source: tx.source,
            amount: tx.amount,
            currency: tx.currency,
            purpose: tx.purpose,
            related_entity_id: tx.related_entity_id,
            narration: tx.narration,
            created_at: tx.created_at,
            completed_at: tx.completed_at,
        }
    }
}

/// Revenue split DTO exposed to business subsystems after a split-bearing
/// payment completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitResponse {
    pub transaction_id: Uuid,
    pub total_amount: Decimal,
    pub dealer_amount: Decimal,
    pub dealer_percentage: Decimal,
    pub platform_amount: Decimal,
    pub platform_percentage: Decimal,
    pub dealer_credited: bool,
    pub dealer_credited_at: Option<DateTime<Utc>>,
}

impl From<RevenueSplit> for SplitResponse {
    fn from(split: RevenueSplit) -> Self {
        Self {
            transaction_id: split.transaction_id,
            total_amount: split.total_amount,
            dealer_amount: split.dealer_amount,
            dealer_percentage: split.dealer_percentage,
            platform_amount: split.platform_amount,
            platform_percentage: split.platform_percentage,
            dealer_credited: split.dealer_credited,
            dealer_credited_at: split.dealer_credited_at,
        }
    }
}

/// Withdrawal request DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    pub payout_reference: String,
    pub rejection_reason: Option<String>,
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WithdrawalRequest> for WithdrawalResponse {
    fn from(request: WithdrawalRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            wallet_id: request.wallet_id,
            amount: request.amount,
            status: request.status,
            payout_reference: request.payout_reference,
            rejection_reason: request.rejection_reason,
            transaction_id: request.transaction_id,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Withdrawal statistics DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalStatsResponse {
    pub by_status: Vec<WithdrawalStatusStat>,
}

/// Paginated list wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}
