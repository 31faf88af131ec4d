use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use wallet_ledger::api::{create_router, AppState};
use wallet_ledger::config::Settings;
use wallet_ledger::events::{spawn_event_logger, EventDispatcher};
use wallet_ledger::gateway::{HttpGatewayClient, WebhookVerifier};
use wallet_ledger::observability::{init_logging, LogConfig, LogFormat};
use wallet_ledger::services::{ReconciliationConfig, WithdrawalConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        include_target: true,
    });
    info!("Configuration loaded");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied");

    // Wire up shared state
    let (events, rx) = EventDispatcher::new();
    spawn_event_logger(rx);

    let state = AppState {
        pool,
        verifier: Arc::new(WebhookVerifier::new(&settings.gateway.webhook_secret)),
        gateway: Arc::new(HttpGatewayClient::new(&settings.gateway)),
        events,
        reconciliation_config: ReconciliationConfig::from(&settings.reconciliation),
        withdrawal_config: WithdrawalConfig::from(&settings.withdrawal),
        stale_pending_hours: settings.reconciliation.stale_pending_hours,
    };

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", settings.application.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
