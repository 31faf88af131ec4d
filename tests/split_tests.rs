mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;
use wallet_ledger::error::AppError;
use wallet_ledger::models::{PaymentPurpose, RevenueSplitSettings, Transaction, TransactionStatus};
use wallet_ledger::repositories::{SplitRepository, TransactionRepository};
use wallet_ledger::services::{RevenueSplitter, WalletStore};

/// Records a completed split-bearing payment for a fresh dealer.
async fn seed_completed_payment(
    pool: &sqlx::PgPool,
    dealer_id: Uuid,
    amount: rust_decimal::Decimal,
) -> Transaction {
    let reference = format!("INS-{}", Uuid::new_v4().simple());
    let mut tx = Transaction::gateway_payment(
        &reference,
        PaymentPurpose::InspectionPayment,
        Uuid::new_v4(),
        Some(dealer_id),
        Some(Uuid::new_v4()),
        amount,
        "NGN",
    );
    tx.status = TransactionStatus::Completed;
    TransactionRepository::new(pool.clone()).create(&tx).await.unwrap()
}

#[tokio::test]
async fn test_settings_activation_is_atomic_and_exclusive() {
    let pool = common::setup_test_db().await;
    let repo = SplitRepository::new(pool.clone());

    let first = repo
        .activate_settings(&RevenueSplitSettings::new(dec!(60), dec!(40)))
        .await
        .unwrap();
    assert!(first.is_active);

    let second = repo
        .activate_settings(&RevenueSplitSettings::new(dec!(70), dec!(30)))
        .await
        .unwrap();
    assert!(second.is_active);

    // Exactly one active row, and it is the latest.
    let active = repo.active_settings().await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
    assert_eq!(active.dealer_percentage, dec!(70));

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM revenue_split_settings WHERE is_active")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);

    // Percentages that do not sum to 100 never activate.
    let err = repo
        .activate_settings(&RevenueSplitSettings::new(dec!(55), dec!(55)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSplitConfig(_)));
    let active = repo.active_settings().await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
}

#[tokio::test]
async fn test_split_credits_dealer_and_is_applied_once() {
    let pool = common::setup_test_db().await;
    let dealer_id = Uuid::new_v4();
    let dealer_wallet = common::create_funded_wallet(&pool, dealer_id, dec!(0)).await;

    let payment = seed_completed_payment(&pool, dealer_id, dec!(5000)).await;

    let splitter = RevenueSplitter::new(pool.clone(), common::test_dispatcher());
    let split = splitter.split(&payment).await.unwrap();

    assert_eq!(split.total_amount, dec!(5000));
    assert_eq!(split.dealer_amount + split.platform_amount, dec!(5000));
    assert!(split.dealer_credited);

    let balance = WalletStore::new(pool.clone())
        .balance(dealer_wallet.id)
        .await
        .unwrap();
    assert_eq!(balance.ledger_balance, split.dealer_amount);

    // Re-running the split returns the recorded row without a second credit.
    let again = splitter.split(&payment).await.unwrap();
    assert_eq!(again.id, split.id);

    let balance = WalletStore::new(pool.clone())
        .balance(dealer_wallet.id)
        .await
        .unwrap();
    assert_eq!(balance.ledger_balance, split.dealer_amount);
}

#[tokio::test]
async fn test_split_without_dealer_wallet_fails_safely() {
    let pool = common::setup_test_db().await;

    // Dealer has no wallet; the split must fail, not invent one.
    let payment = seed_completed_payment(&pool, Uuid::new_v4(), dec!(5000)).await;

    let splitter = RevenueSplitter::new(pool.clone(), common::test_dispatcher());
    let err = splitter.split(&payment).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let recorded = SplitRepository::new(pool.clone())
        .find_by_transaction(payment.id)
        .await
        .unwrap();
    assert!(recorded.is_none());
}
