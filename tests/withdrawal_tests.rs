mod common;

use common::StubGateway;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;
use wallet_ledger::error::AppError;
use wallet_ledger::gateway::GatewayEventKind;
use wallet_ledger::models::{TransactionStatus, WithdrawalStatus};
use wallet_ledger::repositories::TransactionRepository;
use wallet_ledger::services::{
    ReconciliationConfig, ReconciliationEngine, WalletStore, WithdrawalConfig, WithdrawalWorkflow,
};

fn workflow(pool: &sqlx::PgPool, gateway: Arc<StubGateway>) -> WithdrawalWorkflow {
    WithdrawalWorkflow::new(
        pool.clone(),
        gateway,
        common::test_dispatcher(),
        WithdrawalConfig {
            minimum_amount: dec!(1),
            lock_timeout_ms: 2000,
        },
    )
}

#[tokio::test]
async fn test_create_locks_funds_and_prevents_overdraw() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let wallet = common::create_funded_wallet(&pool, user_id, dec!(10000)).await;
    let workflow = workflow(&pool, Arc::new(StubGateway::new()));

    let request = workflow.create(user_id, dec!(10000), "RCP_dest").await.unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);

    let balance = WalletStore::new(pool.clone()).balance(wallet.id).await.unwrap();
    assert_eq!(balance.ledger_balance, dec!(10000));
    assert_eq!(balance.locked_amount, dec!(10000));
    assert_eq!(balance.available_balance(), Decimal::ZERO);

    // Even one naira more cannot be locked.
    let err = workflow.create(user_id, dec!(1), "RCP_dest").await.unwrap_err();
    match err {
        AppError::InsufficientBalance {
            requested,
            available,
        } => {
            assert_eq!(requested, dec!(1));
            assert_eq!(available, Decimal::ZERO);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_minimum_amount_is_enforced() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    common::create_funded_wallet(&pool, user_id, dec!(10000)).await;

    let workflow = WithdrawalWorkflow::new(
        pool.clone(),
        Arc::new(StubGateway::new()),
        common::test_dispatcher(),
        WithdrawalConfig {
            minimum_amount: dec!(1000),
            lock_timeout_ms: 2000,
        },
    );

    let err = workflow.create(user_id, dec!(999), "RCP_dest").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_reject_requires_reason_and_releases_lock() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let wallet = common::create_funded_wallet(&pool, user_id, dec!(5000)).await;
    let workflow = workflow(&pool, Arc::new(StubGateway::new()));

    let request = workflow.create(user_id, dec!(2000), "RCP_dest").await.unwrap();

    let err = workflow
        .reject(request.id, Uuid::new_v4(), "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let rejected = workflow
        .reject(request.id, Uuid::new_v4(), "payout account name mismatch")
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("payout account name mismatch")
    );

    let balance = WalletStore::new(pool.clone()).balance(wallet.id).await.unwrap();
    assert_eq!(balance.locked_amount, Decimal::ZERO);
    assert_eq!(balance.available_balance(), dec!(5000));

    // The earmark transaction is terminal.
    let debit = TransactionRepository::new(pool.clone())
        .find_by_id(rejected.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(debit.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn test_cancel_is_owner_only_and_pending_only() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    common::create_funded_wallet(&pool, user_id, dec!(5000)).await;
    let workflow = workflow(&pool, Arc::new(StubGateway::new()));

    let request = workflow.create(user_id, dec!(2000), "RCP_dest").await.unwrap();

    let err = workflow.cancel(request.id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let cancelled = workflow.cancel(request.id, user_id).await.unwrap();
    assert_eq!(cancelled.status, WithdrawalStatus::Cancelled);

    // Approved requests cannot be cancelled by the owner.
    let second = workflow.create(user_id, dec!(2000), "RCP_dest").await.unwrap();
    workflow.approve(second.id, Uuid::new_v4()).await.unwrap();
    let err = workflow.cancel(second.id, user_id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_process_debits_wallet_and_awaits_gateway() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let wallet = common::create_funded_wallet(&pool, user_id, dec!(10000)).await;
    let gateway = Arc::new(StubGateway::new());
    let workflow = workflow(&pool, gateway.clone());

    let request = workflow.create(user_id, dec!(2500), "RCP_dest").await.unwrap();
    workflow.approve(request.id, Uuid::new_v4()).await.unwrap();
    let processed = workflow.process(request.id).await.unwrap();

    assert_eq!(processed.status, WithdrawalStatus::Processing);
    assert_eq!(gateway.transfer_calls.load(Ordering::SeqCst), 1);

    // Lock released, ledger reduced, debit pending gateway confirmation.
    let balance = WalletStore::new(pool.clone()).balance(wallet.id).await.unwrap();
    assert_eq!(balance.ledger_balance, dec!(7500));
    assert_eq!(balance.locked_amount, Decimal::ZERO);

    let debit = TransactionRepository::new(pool.clone())
        .find_by_id(processed.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(debit.status, TransactionStatus::Pending);

    // The transfer webhook completes the withdrawal.
    let engine = ReconciliationEngine::new(
        pool.clone(),
        common::test_dispatcher(),
        ReconciliationConfig::default(),
    );
    let event = common::transfer_event(
        GatewayEventKind::TransferSucceeded,
        &debit.external_reference,
        dec!(2500),
    );
    engine.apply(&event).await.unwrap();

    let completed = workflow.get(request.id).await.unwrap();
    assert_eq!(completed.status, WithdrawalStatus::Completed);
}

#[tokio::test]
async fn test_failed_initiation_restores_funds_without_debit() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let wallet = common::create_funded_wallet(&pool, user_id, dec!(10000)).await;
    let workflow = workflow(&pool, Arc::new(StubGateway::failing()));

    let request = workflow.create(user_id, dec!(2500), "RCP_dest").await.unwrap();
    workflow.approve(request.id, Uuid::new_v4()).await.unwrap();
    let failed = workflow.process(request.id).await.unwrap();

    assert_eq!(failed.status, WithdrawalStatus::Failed);

    let balance = WalletStore::new(pool.clone()).balance(wallet.id).await.unwrap();
    assert_eq!(balance.ledger_balance, dec!(10000));
    assert_eq!(balance.locked_amount, Decimal::ZERO);

    let debit = TransactionRepository::new(pool.clone())
        .find_by_id(failed.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(debit.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn test_transfer_failed_webhook_credits_funds_back() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let wallet = common::create_funded_wallet(&pool, user_id, dec!(10000)).await;
    let workflow = workflow(&pool, Arc::new(StubGateway::new()));

    let request = workflow.create(user_id, dec!(2500), "RCP_dest").await.unwrap();
    workflow.approve(request.id, Uuid::new_v4()).await.unwrap();
    let processed = workflow.process(request.id).await.unwrap();
    assert_eq!(processed.status, WithdrawalStatus::Processing);

    let debit = TransactionRepository::new(pool.clone())
        .find_by_id(processed.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();

    // The gateway later reports the transfer failed.
    let engine = ReconciliationEngine::new(
        pool.clone(),
        common::test_dispatcher(),
        ReconciliationConfig::default(),
    );
    let event = common::transfer_event(
        GatewayEventKind::TransferFailed,
        &debit.external_reference,
        dec!(2500),
    );
    engine.apply(&event).await.unwrap();

    // Funds are credited back; nothing was lost.
    let balance = WalletStore::new(pool.clone()).balance(wallet.id).await.unwrap();
    assert_eq!(balance.ledger_balance, dec!(10000));

    let failed = workflow.get(request.id).await.unwrap();
    assert_eq!(failed.status, WithdrawalStatus::Failed);

    let reconciled = TransactionRepository::new(pool.clone())
        .find_by_id(debit.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reconciled.status, TransactionStatus::Failed);

    // The compensating credit is on the ledger.
    let compensation = TransactionRepository::new(pool.clone())
        .find_by_reference(&format!("{}-REV", debit.external_reference))
        .await
        .unwrap()
        .expect("compensating credit should exist");
    assert_eq!(compensation.amount, dec!(2500));
    assert_eq!(compensation.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_stats_aggregate_by_status() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    common::create_funded_wallet(&pool, user_id, dec!(50000)).await;
    let workflow = workflow(&pool, Arc::new(StubGateway::new()));

    workflow.create(user_id, dec!(1000), "RCP_dest").await.unwrap();
    workflow.create(user_id, dec!(3000), "RCP_dest").await.unwrap();

    let stats = workflow.stats().await.unwrap();
    let pending = stats
        .iter()
        .find(|s| s.status == WithdrawalStatus::Pending)
        .expect("pending bucket");
    assert!(pending.request_count >= 2);
    assert!(pending.total_amount >= dec!(4000));
}
