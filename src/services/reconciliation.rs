use crate::config::ReconciliationSettings;
use crate::error::{AppError, Result};
use crate::events::{
    EventDispatcher, EventEnvelope, EventType, OutboundEvent, ReconciliationEvent, WithdrawalEvent,
};
use crate::gateway::{GatewayEventKind, PaymentEvent};
use crate::models::{PaymentPurpose, Transaction, TransactionStatus};
use crate::repositories::{TransactionRepository, WalletRepository, WithdrawalRepository};
use crate::services::revenue_splitter::RevenueSplitter;
use crate::services::wallet_store::WalletStore;
use sqlx::{PgConnection, PgPool, Postgres};
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of applying one settlement event.
#[derive(Debug)]
pub enum ReconciliationOutcome {
    /// The event was applied; the wallet state changed exactly once.
    Applied(Transaction),
    /// The reference was already reconciled. Idempotent no-op.
    AlreadyProcessed(Transaction),
}

impl ReconciliationOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            ReconciliationOutcome::Applied(tx) => tx,
            ReconciliationOutcome::AlreadyProcessed(tx) => tx,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub lock_timeout_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 200,
            lock_timeout_ms: 2000,
        }
    }
}

impl From<&ReconciliationSettings> for ReconciliationConfig {
    fn from(settings: &ReconciliationSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_backoff_ms: settings.retry_backoff_ms,
            lock_timeout_ms: settings.lock_timeout_ms,
        }
    }
}

/// Applies normalized gateway events to the wallet store and the transaction
/// ledger exactly once.
///
/// Correctness under at-least-once, out-of-order delivery rests on the
/// unique `external_reference`: a reference with a terminal status
/// short-circuits before any lock is taken, and the terminal transition is
/// re-checked under the wallet row lock. Delivery ordering is never assumed.
pub struct ReconciliationEngine {
    pool: PgPool,
    transaction_repo: TransactionRepository,
    splitter: RevenueSplitter,
    events: EventDispatcher,
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub fn new(pool: PgPool, events: EventDispatcher, config: ReconciliationConfig) -> Self {
        Self {
            transaction_repo: TransactionRepository::new(pool.clone()),
            splitter: RevenueSplitter::new(pool.clone(), events.clone()),
            pool,
            events,
            config,
        }
    }

    /// Applies one event, retrying transient conflicts with exponential
    /// backoff. Unresolvable errors leave the transaction pending and bubble
    /// up for manual reconciliation; nothing guesses an outcome.
    #[instrument(skip(self, event), fields(reference = %event.reference, kind = ?event.kind))]
    pub async fn apply(&self, event: &PaymentEvent) -> Result<ReconciliationOutcome> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_apply(event).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff_ms * u64::from(1u32 << attempt.min(8));
                    warn!(
                        reference = %event.reference,
                        attempt,
                        backoff_ms = backoff,
                        "transient conflict while reconciling; retrying: {e}"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    error!(
                        reference = %event.reference,
                        amount = %event.amount,
                        "failed to reconcile event: {e}"
                    );
                    return Err(e);
                }
                Ok(outcome) => {
                    if let ReconciliationOutcome::AlreadyProcessed(tx) = &outcome {
                        info!(
                            reference = %tx.external_reference,
                            "duplicate delivery; already reconciled"
                        );
                    }
                    return Ok(outcome);
                }
            }
        }
    }

    async fn try_apply(&self, event: &PaymentEvent) -> Result<ReconciliationOutcome> {
        // Primary idempotency gate: a terminal reference never re-applies.
        let existing = self.transaction_repo.find_by_reference(&event.reference).await?;
        if let Some(tx) = &existing {
            if tx.is_terminal() {
                return Ok(ReconciliationOutcome::AlreadyProcessed(tx.clone()));
            }
        }

        match event.kind {
            GatewayEventKind::ChargeSucceeded => self.apply_charge(event, existing).await,
            GatewayEventKind::TransferSucceeded => self.apply_transfer_success(event, existing).await,
            GatewayEventKind::TransferFailed => {
                self.apply_transfer_reversal(event, existing, TransactionStatus::Failed)
                    .await
            }
            GatewayEventKind::TransferReversed => {
                self.apply_transfer_reversal(event, existing, TransactionStatus::Reversed)
                    .await
            }
        }
    }

    /// Inbound charge settlement: wallet funding, booking payment or a
    /// split-bearing inspection payment.
    async fn apply_charge(
        &self,
        event: &PaymentEvent,
        existing: Option<Transaction>,
    ) -> Result<ReconciliationOutcome> {
        let purpose = match &existing {
            Some(tx) => tx.purpose.ok_or_else(|| {
                AppError::Validation(format!(
                    "transaction '{}' carries no purpose; cannot reconcile a charge against it",
                    tx.external_reference
                ))
            })?,
            // No prior record: only self-initiating purposes may create one.
            None => {
                let purpose = event
                    .purpose
                    .ok_or_else(|| AppError::UnknownReference(event.reference.clone()))?;
                if !purpose.is_self_initiating() {
                    return Err(AppError::UnknownReference(event.reference.clone()));
                }
                purpose
            }
        };

        match purpose {
            PaymentPurpose::WalletFunding => self.apply_wallet_credit_charge(event, true).await,
            PaymentPurpose::BookingPayment => self.apply_wallet_credit_charge(event, false).await,
            PaymentPurpose::InspectionPayment => self.apply_split_charge(event).await,
            PaymentPurpose::WithdrawalPayout => Err(AppError::Validation(format!(
                "charge event received for payout reference '{}'",
                event.reference
            ))),
        }
    }

    /// Charges that credit a single destination wallet. `self_initiating`
    /// charges may create their own pending record under the wallet lock.
    async fn apply_wallet_credit_charge(
        &self,
        event: &PaymentEvent,
        self_initiating: bool,
    ) -> Result<ReconciliationOutcome> {
        let mut db = self.begin().await?;

        // Wallet lock first, transaction row second. Every path takes locks
        // in this order.
        let wallet = self.resolve_charge_wallet(&mut *db, event).await?;

        let pending = match TransactionRepository::find_by_reference_for_update(
            &mut *db,
            &event.reference,
        )
        .await?
        {
            Some(tx) if tx.is_terminal() => {
                return Ok(ReconciliationOutcome::AlreadyProcessed(tx));
            }
            Some(tx) => tx,
            None if self_initiating => {
                let user_id = event.user_id.ok_or_else(|| {
                    AppError::Validation(format!(
                        "funding event '{}' carries no user id",
                        event.reference
                    ))
                })?;
                let tx = Transaction::funding(
                    event.reference.clone(),
                    user_id,
                    wallet.id,
                    event.amount,
                    wallet.currency.clone(),
                );
                TransactionRepository::create_in_tx(&mut *db, &tx)
                    .await
                    .map_err(|e| match e {
                        // A racer inserted the row between our preview and the
                        // wallet lock; back off and re-apply.
                        AppError::DuplicateEvent(reference) => AppError::ConcurrencyConflict(
                            format!("reference '{}' created concurrently", reference),
                        ),
                        other => other,
                    })?
            }
            None => return Err(AppError::UnknownReference(event.reference.clone())),
        };

        self.validate_amount(&pending, event)?;

        WalletStore::credit_in_tx(&mut *db, wallet.id, pending.amount, &pending.external_reference)
            .await?;
        let completed = TransactionRepository::transition_status_in_tx(
            &mut *db,
            pending.id,
            TransactionStatus::Pending,
            TransactionStatus::Completed,
        )
        .await?;

        db.commit().await.map_err(AppError::from_sqlx)?;

        self.emit_reconciled(&completed);
        Ok(ReconciliationOutcome::Applied(completed))
    }

    /// Split-bearing inspection payment: no destination wallet credit; the
    /// splitter credits the dealer share inside the same transaction.
    async fn apply_split_charge(&self, event: &PaymentEvent) -> Result<ReconciliationOutcome> {
        let mut db = self.begin().await?;

        let pending = match TransactionRepository::find_by_reference_for_update(
            &mut *db,
            &event.reference,
        )
        .await?
        {
            Some(tx) if tx.is_terminal() => {
                return Ok(ReconciliationOutcome::AlreadyProcessed(tx));
            }
            Some(tx) => tx,
            None => return Err(AppError::UnknownReference(event.reference.clone())),
        };

        self.validate_amount(&pending, event)?;

        let completed = TransactionRepository::transition_status_in_tx(
            &mut *db,
            pending.id,
            TransactionStatus::Pending,
            TransactionStatus::Completed,
        )
        .await?;
        self.splitter.split_in_tx(&mut *db, &completed).await?;

        db.commit().await.map_err(AppError::from_sqlx)?;

        self.emit_reconciled(&completed);
        Ok(ReconciliationOutcome::Applied(completed))
    }

    /// The payout transfer settled: terminalize the debit transaction and
    /// complete its withdrawal.
    async fn apply_transfer_success(
        &self,
        event: &PaymentEvent,
        existing: Option<Transaction>,
    ) -> Result<ReconciliationOutcome> {
        let preview = existing.ok_or_else(|| AppError::UnknownReference(event.reference.clone()))?;
        let wallet_id = self.require_wallet(&preview)?;

        let mut db = self.begin().await?;
        WalletRepository::lock_for_update(&mut *db, wallet_id).await?;

        let debit =
            match TransactionRepository::find_by_reference_for_update(&mut *db, &event.reference)
                .await?
            {
                Some(tx) if tx.is_terminal() => {
                    return Ok(ReconciliationOutcome::AlreadyProcessed(tx));
                }
                Some(tx) => tx,
                None => return Err(AppError::UnknownReference(event.reference.clone())),
            };

        self.validate_amount(&debit, event)?;

        let completed = TransactionRepository::transition_status_in_tx(
            &mut *db,
            debit.id,
            TransactionStatus::Pending,
            TransactionStatus::Completed,
        )
        .await?;

        let withdrawal =
            WithdrawalRepository::find_by_transaction_for_update(&mut *db, completed.id).await?;
        let withdrawal = match withdrawal {
            Some(mut request) => {
                request.complete()?;
                Some(WithdrawalRepository::update_in_tx(&mut *db, &request).await?)
            }
            None => None,
        };

        db.commit().await.map_err(AppError::from_sqlx)?;

        self.emit_reconciled(&completed);
        if let Some(request) = withdrawal {
            self.events
                .emit(OutboundEvent::Withdrawal(EventEnvelope::new(
                    EventType::WithdrawalCompleted,
                    WithdrawalEvent {
                        withdrawal_id: request.id,
                        user_id: request.user_id,
                        amount: request.amount,
                        reference: Some(completed.external_reference.clone()),
                    },
                )));
        }
        Ok(ReconciliationOutcome::Applied(completed))
    }

    /// The payout transfer failed or was reversed after the wallet was
    /// debited: credit the funds back and terminalize, never losing money.
    async fn apply_transfer_reversal(
        &self,
        event: &PaymentEvent,
        existing: Option<Transaction>,
        terminal_status: TransactionStatus,
    ) -> Result<ReconciliationOutcome> {
        let preview = existing.ok_or_else(|| AppError::UnknownReference(event.reference.clone()))?;
        let wallet_id = self.require_wallet(&preview)?;

        let mut db = self.begin().await?;
        WalletRepository::lock_for_update(&mut *db, wallet_id).await?;

        let debit =
            match TransactionRepository::find_by_reference_for_update(&mut *db, &event.reference)
                .await?
            {
                Some(tx) if tx.is_terminal() => {
                    return Ok(ReconciliationOutcome::AlreadyProcessed(tx));
                }
                Some(tx) => tx,
                None => return Err(AppError::UnknownReference(event.reference.clone())),
            };

        self.validate_amount(&debit, event)?;

        // Compensating credit restores the debited funds in the same atomic
        // scope as the terminal transition.
        WalletStore::credit_in_tx(&mut *db, wallet_id, debit.amount, &debit.external_reference)
            .await?;
        let compensation = Transaction::compensating_credit(
            &debit,
            format!("{}-REV", debit.external_reference),
        );
        TransactionRepository::create_in_tx(&mut *db, &compensation).await?;

        let terminal = TransactionRepository::transition_status_in_tx(
            &mut *db,
            debit.id,
            TransactionStatus::Pending,
            terminal_status,
        )
        .await?;

        let withdrawal =
            WithdrawalRepository::find_by_transaction_for_update(&mut *db, terminal.id).await?;
        let withdrawal = match withdrawal {
            Some(mut request) => {
                request.fail()?;
                Some(WithdrawalRepository::update_in_tx(&mut *db, &request).await?)
            }
            None => None,
        };

        db.commit().await.map_err(AppError::from_sqlx)?;

        warn!(
            reference = %terminal.external_reference,
            wallet_id = %wallet_id,
            amount = %terminal.amount,
            "payout transfer did not settle; funds credited back"
        );
        self.emit_reconciled(&terminal);
        if let Some(request) = withdrawal {
            self.events
                .emit(OutboundEvent::Withdrawal(EventEnvelope::new(
                    EventType::WithdrawalFailed,
                    WithdrawalEvent {
                        withdrawal_id: request.id,
                        user_id: request.user_id,
                        amount: request.amount,
                        reference: Some(terminal.external_reference.clone()),
                    },
                )));
        }
        Ok(ReconciliationOutcome::Applied(terminal))
    }

    /// Transactions stuck pending beyond the configured age, for manual
    /// reconciliation.
    pub async fn manual_review_queue(
        &self,
        max_age_hours: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>> {
        self.transaction_repo
            .find_stale_pending(max_age_hours, limit)
            .await
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'_, Postgres>> {
        let mut db = self.pool.begin().await.map_err(AppError::from_sqlx)?;
        WalletRepository::set_lock_timeout(&mut *db, self.config.lock_timeout_ms).await?;
        Ok(db)
    }

    /// The wallet a charge settles into: the recorded one for a known
    /// transaction, otherwise resolved from the event's user id.
    async fn resolve_charge_wallet(
        &self,
        db: &mut PgConnection,
        event: &PaymentEvent,
    ) -> Result<crate::models::Wallet> {
        let preview = self.transaction_repo.find_by_reference(&event.reference).await?;
        match preview {
            Some(tx) => {
                if let Some(wallet_id) = tx.wallet_id {
                    return WalletRepository::lock_for_update(db, wallet_id).await;
                }
                let recipient = tx.recipient_id.ok_or_else(|| {
                    AppError::Validation(format!(
                        "transaction '{}' has neither a wallet nor a recipient",
                        tx.external_reference
                    ))
                })?;
                WalletRepository::lock_by_user_for_update(db, recipient).await
            }
            None => {
                let user_id = event.user_id.ok_or_else(|| {
                    AppError::UnknownReference(event.reference.clone())
                })?;
                WalletRepository::lock_by_user_for_update(db, user_id).await
            }
        }
    }

    fn require_wallet(&self, transaction: &Transaction) -> Result<Uuid> {
        transaction.wallet_id.ok_or_else(|| {
            AppError::Validation(format!(
                "transfer event for '{}' but the transaction has no wallet",
                transaction.external_reference
            ))
        })
    }

    /// The event amount must equal the recorded transaction amount exactly.
    /// A mismatch leaves the transaction pending for manual review.
    fn validate_amount(&self, transaction: &Transaction, event: &PaymentEvent) -> Result<()> {
        if transaction.amount != event.amount {
            error!(
                reference = %transaction.external_reference,
                expected = %transaction.amount,
                received = %event.amount,
                wallet_id = ?transaction.wallet_id,
                "event amount does not match the recorded transaction"
            );
            return Err(AppError::Validation(format!(
                "amount mismatch for '{}': expected {}, event carries {}",
                transaction.external_reference, transaction.amount, event.amount
            )));
        }
        Ok(())
    }

    fn emit_reconciled(&self, transaction: &Transaction) {
        self.events
            .emit(OutboundEvent::Reconciliation(EventEnvelope::new(
                EventType::PaymentReconciled,
                ReconciliationEvent {
                    reference: transaction.external_reference.clone(),
                    transaction_id: transaction.id,
                    status: transaction.status,
                    amount: transaction.amount,
                    related_entity_id: transaction.related_entity_id,
                },
            )));
    }
}
