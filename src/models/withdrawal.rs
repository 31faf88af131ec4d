use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    /// Awaiting reviewer decision. Funds are locked.
    Pending,
    /// Approved by a reviewer; lock retained until processing.
    Approved,
    /// Payout transfer initiated; awaiting gateway confirmation.
    Processing,
    Completed,
    /// Payout failed; funds restored to the wallet.
    Failed,
    Rejected,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed
                | WithdrawalStatus::Failed
                | WithdrawalStatus::Rejected
                | WithdrawalStatus::Cancelled
        )
    }

    /// Requests in these states still hold a lock on wallet funds.
    pub fn holds_lock(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Approved)
    }
}

/// A manual-approval payout request debiting a wallet through the same
/// locking discipline as every other balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    /// Destination the gateway pays out to (recipient code / bank reference).
    pub payout_reference: String,
    pub status: WithdrawalStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// The funds-locked debit transaction backing this request.
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    pub fn new(
        user_id: Uuid,
        wallet_id: Uuid,
        amount: Decimal,
        payout_reference: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            wallet_id,
            amount,
            payout_reference: payout_reference.into(),
            status: WithdrawalStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Reviewer approval. Keeps the funds lock in place.
    pub fn approve(&mut self, reviewer: Uuid) -> Result<()> {
        self.require_status(WithdrawalStatus::Pending, "approve")?;
        self.status = WithdrawalStatus::Approved;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Reviewer rejection. A non-empty reason is required.
    pub fn reject(&mut self, reviewer: Uuid, reason: &str) -> Result<()> {
        self.require_status(WithdrawalStatus::Pending, "reject")?;
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        self.status = WithdrawalStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(Utc::now());
        self.rejection_reason = Some(reason.trim().to_string());
        self.touch();
        Ok(())
    }

    /// Owner cancellation, permitted only while pending.
    pub fn cancel(&mut self, owner: Uuid) -> Result<()> {
        if owner != self.user_id {
            return Err(AppError::Validation(
                "only the request owner may cancel".to_string(),
            ));
        }
        self.require_status(WithdrawalStatus::Pending, "cancel")?;
        self.status = WithdrawalStatus::Cancelled;
        self.touch();
        Ok(())
    }

    pub fn begin_processing(&mut self) -> Result<()> {
        self.require_status(WithdrawalStatus::Approved, "process")?;
        self.status = WithdrawalStatus::Processing;
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.require_status(WithdrawalStatus::Processing, "complete")?;
        self.status = WithdrawalStatus::Completed;
        self.touch();
        Ok(())
    }

    /// Marks the payout failed. Valid from processing (gateway reported a
    /// failed or reversed transfer) or pending/approved (payout initiation
    /// itself failed).
    pub fn fail(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "cannot fail a withdrawal in terminal status {:?}",
                self.status
            )));
        }
        self.status = WithdrawalStatus::Failed;
        self.touch();
        Ok(())
    }

    fn require_status(&self, expected: WithdrawalStatus, action: &str) -> Result<()> {
        if self.status != expected {
            return Err(AppError::Validation(format!(
                "cannot {} a withdrawal in status {:?}",
                action, self.status
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Aggregate row for the withdrawal statistics query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawalStatusStat {
    pub status: WithdrawalStatus,
    pub request_count: i64,
    pub total_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> WithdrawalRequest {
        WithdrawalRequest::new(Uuid::new_v4(), Uuid::new_v4(), dec!(10000), "RCP_abc123")
    }

    #[test]
    fn test_new_request_is_pending() {
        let req = request();
        assert_eq!(req.status, WithdrawalStatus::Pending);
        assert!(req.status.holds_lock());
        assert!(req.reviewed_by.is_none());
    }

    #[test]
    fn test_happy_path_lifecycle() {
        let mut req = request();
        let reviewer = Uuid::new_v4();

        req.approve(reviewer).unwrap();
        assert_eq!(req.status, WithdrawalStatus::Approved);
        assert_eq!(req.reviewed_by, Some(reviewer));
        assert!(req.status.holds_lock());

        req.begin_processing().unwrap();
        assert_eq!(req.status, WithdrawalStatus::Processing);
        assert!(!req.status.holds_lock());

        req.complete().unwrap();
        assert_eq!(req.status, WithdrawalStatus::Completed);
        assert!(req.status.is_terminal());
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut req = request();
        let err = req.reject(Uuid::new_v4(), "   ").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(req.status, WithdrawalStatus::Pending);

        req.reject(Uuid::new_v4(), "unverified payout account")
            .unwrap();
        assert_eq!(req.status, WithdrawalStatus::Rejected);
        assert_eq!(
            req.rejection_reason.as_deref(),
            Some("unverified payout account")
        );
    }

    #[test]
    fn test_cancel_is_owner_only_and_pending_only() {
        let mut req = request();
        let stranger = Uuid::new_v4();
        assert!(req.cancel(stranger).is_err());

        let owner = req.user_id;
        req.approve(Uuid::new_v4()).unwrap();
        assert!(req.cancel(owner).is_err());

        let mut req = request();
        let owner = req.user_id;
        req.cancel(owner).unwrap();
        assert_eq!(req.status, WithdrawalStatus::Cancelled);
    }

    #[test]
    fn test_cannot_process_unapproved() {
        let mut req = request();
        assert!(req.begin_processing().is_err());
        assert!(req.complete().is_err());
    }

    #[test]
    fn test_fail_from_processing() {
        let mut req = request();
        req.approve(Uuid::new_v4()).unwrap();
        req.begin_processing().unwrap();
        req.fail().unwrap();
        assert_eq!(req.status, WithdrawalStatus::Failed);
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        let mut req = request();
        req.reject(Uuid::new_v4(), "duplicate request").unwrap();
        assert!(req.approve(Uuid::new_v4()).is_err());
        assert!(req.fail().is_err());
        let owner = req.user_id;
        assert!(req.cancel(owner).is_err());
    }
}
