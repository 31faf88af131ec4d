use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::events::EventDispatcher;
use crate::gateway::{PaymentGatewayClient, WebhookVerifier};
use crate::services::{ReconciliationConfig, WithdrawalConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub verifier: Arc<WebhookVerifier>,
    pub gateway: Arc<dyn PaymentGatewayClient>,
    pub events: EventDispatcher,
    pub reconciliation_config: ReconciliationConfig,
    pub withdrawal_config: WithdrawalConfig,
    pub stale_pending_hours: i64,
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Gateway webhook
        .route("/webhooks/gateway", post(handlers::receive_webhook))
        // Payment initiation and status
        .route("/payments", post(handlers::initiate_payment))
        .route("/payments/:reference", get(handlers::get_payment_status))
        .route("/reconciliation/pending", get(handlers::list_pending_review))
        // Wallets
        .route("/wallets", post(handlers::open_wallet))
        .route("/wallets/:user_id", get(handlers::get_wallet))
        .route(
            "/wallets/:user_id/transactions",
            get(handlers::list_wallet_transactions),
        )
        // Revenue splits
        .route(
            "/splits/transaction/:transaction_id",
            get(handlers::get_split_for_transaction),
        )
        .route(
            "/splits/entity/:related_id",
            get(handlers::get_split_for_related_entity),
        )
        .route(
            "/splits/settings",
            get(handlers::get_active_split_settings).put(handlers::activate_split_settings),
        )
        // Withdrawals
        .route(
            "/withdrawals",
            post(handlers::create_withdrawal).get(handlers::list_withdrawals),
        )
        .route("/withdrawals/stats", get(handlers::withdrawal_stats))
        .route("/withdrawals/:id", get(handlers::get_withdrawal))
        .route("/withdrawals/:id/approve", post(handlers::approve_withdrawal))
        .route("/withdrawals/:id/reject", post(handlers::reject_withdrawal))
        .route("/withdrawals/:id/cancel", post(handlers::cancel_withdrawal))
        .route("/withdrawals/:id/process", post(handlers::process_withdrawal))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
