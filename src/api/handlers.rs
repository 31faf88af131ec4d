use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::api::requests::{
    ActivateSplitSettingsRequest, ApproveWithdrawalRequest, CancelWithdrawalRequest,
    CreateWithdrawalRequest, InitiatePaymentRequest, ListTransactionsQuery, ListWithdrawalsQuery,
    OpenWalletRequest, RejectWithdrawalRequest, ValidationError,
};
use crate::api::responses::{
    ApiResponse, ErrorResponse, HealthResponse, PaginatedResponse, SplitResponse,
    TransactionResponse, ValidationErrorDetail, WalletResponse, WithdrawalResponse,
    WithdrawalStatsResponse,
};
use crate::error::AppError;
use crate::gateway::{self, parse_event};
use crate::models::{RevenueSplitSettings, TransactionStatus, WithdrawalStatus};
use crate::repositories::{SplitRepository, TransactionRepository};
use crate::services::{
    InitiationRequest, PaymentService, ReconciliationEngine, RevenueSplitter, WalletStore,
    WithdrawalWorkflow,
};

use super::routes::AppState;

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

/// Maps an application error onto an HTTP error response.
fn map_error(e: AppError) -> HandlerError {
    let (status, code) = match &e {
        AppError::Validation(_) | AppError::InvalidSplitConfig(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        }
        AppError::InsufficientBalance { .. } => (StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE"),
        AppError::NotFound(_) | AppError::UnknownReference(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        }
        AppError::ConcurrencyConflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        AppError::Signature => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
        _ => {
            tracing::error!("request failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                ))),
            );
        }
    };
    (
        status,
        Json(ApiResponse::<()>::error(ErrorResponse::new(
            code,
            e.to_string(),
        ))),
    )
}

fn validation_failure(errors: Vec<ValidationError>) -> HandlerError {
    let details: Vec<ValidationErrorDetail> = errors
        .into_iter()
        .map(|e| ValidationErrorDetail {
            field: e.field,
            message: e.message,
        })
        .collect();
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

fn parse_status(raw: Option<&String>) -> Result<Option<TransactionStatus>, HandlerError> {
    match raw.map(|s| s.to_uppercase()) {
        None => Ok(None),
        Some(s) => match s.as_str() {
            "LOCKED" => Ok(Some(TransactionStatus::Locked)),
            "PENDING" => Ok(Some(TransactionStatus::Pending)),
            "COMPLETED" => Ok(Some(TransactionStatus::Completed)),
            "FAILED" => Ok(Some(TransactionStatus::Failed)),
            "REVERSED" => Ok(Some(TransactionStatus::Reversed)),
            other => Err((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "VALIDATION_ERROR",
                    format!("Invalid status '{}'", other),
                ))),
            )),
        },
    }
}

fn parse_withdrawal_status(raw: Option<&String>) -> Result<Option<WithdrawalStatus>, HandlerError> {
    match raw.map(|s| s.to_uppercase()) {
        None => Ok(None),
        Some(s) => match s.as_str() {
            "PENDING" => Ok(Some(WithdrawalStatus::Pending)),
            "APPROVED" => Ok(Some(WithdrawalStatus::Approved)),
            "PROCESSING" => Ok(Some(WithdrawalStatus::Processing)),
            "COMPLETED" => Ok(Some(WithdrawalStatus::Completed)),
            "FAILED" => Ok(Some(WithdrawalStatus::Failed)),
            "REJECTED" => Ok(Some(WithdrawalStatus::Rejected)),
            "CANCELLED" => Ok(Some(WithdrawalStatus::Cancelled)),
            other => Err((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "VALIDATION_ERROR",
                    format!("Invalid status '{}'", other),
                ))),
            )),
        },
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    Json(ApiResponse::success(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        database: db_healthy,
    }))
}

pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// Webhook
// ============================================================================

/// Gateway webhook intake.
///
/// Responds 401 only on signature failure. Recognized, already-processed and
/// permanently-malformed events are all acknowledged with 200 so the gateway
/// stops redelivering; transient failures respond 500 so the gateway retries
/// and the idempotency gate absorbs the duplicate.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let signature = headers
        .get(&gateway::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = state.verifier.verify(&body, signature) {
        tracing::warn!("webhook rejected: {e}");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(ErrorResponse::new(
                "INVALID_SIGNATURE",
                "Signature verification failed",
            ))),
        );
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            // Permanently malformed: acknowledge so the gateway stops
            // retrying, apply nothing.
            tracing::error!("acknowledged unprocessable webhook: {e}");
            return (
                StatusCode::OK,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "UNPROCESSABLE_EVENT",
                    e.to_string(),
                ))),
            );
        }
    };

    let engine = ReconciliationEngine::new(
        state.pool.clone(),
        state.events.clone(),
        state.reconciliation_config.clone(),
    );

    match engine.apply(&event).await {
        Ok(_) => (StatusCode::OK, Json(ApiResponse::success(()))),
        Err(AppError::Validation(msg)) => {
            // Recognized but inconsistent (e.g. amount mismatch). The
            // transaction stays pending for manual review; redelivery of the
            // same payload cannot fix it.
            tracing::error!(reference = %event.reference, "event parked for manual review: {msg}");
            (
                StatusCode::OK,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "NEEDS_MANUAL_REVIEW",
                    msg,
                ))),
            )
        }
        Err(e) => {
            tracing::error!(reference = %event.reference, "webhook processing failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "PROCESSING_ERROR",
                    "Event could not be applied",
                ))),
            )
        }
    }
}

// ============================================================================
// Payments
// ============================================================================

pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<crate::gateway::InitiatedPayment>>), HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_failure(errors));
    }

    let service = PaymentService::new(state.pool.clone(), state.gateway.clone());
    let initiated = service
        .initiate(InitiationRequest {
            amount: request.amount,
            purpose: request.purpose,
            related_id: request.related_id,
            user_id: request.user_id,
            email: request.email,
            beneficiary_id: request.beneficiary_id,
        })
        .await
        .map_err(map_error)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(initiated))))
}

pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<TransactionResponse>>, HandlerError> {
    let service = PaymentService::new(state.pool.clone(), state.gateway.clone());
    let transaction = service.status(&reference).await.map_err(map_error)?;
    Ok(Json(ApiResponse::success(TransactionResponse::from(
        transaction,
    ))))
}

/// Transactions stuck pending beyond the configured age.
pub async fn list_pending_review(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, HandlerError> {
    let engine = ReconciliationEngine::new(
        state.pool.clone(),
        state.events.clone(),
        state.reconciliation_config.clone(),
    );
    let stale = engine
        .manual_review_queue(state.stale_pending_hours, 100)
        .await
        .map_err(map_error)?;
    Ok(Json(ApiResponse::success(
        stale.into_iter().map(TransactionResponse::from).collect(),
    )))
}

// ============================================================================
// Wallets
// ============================================================================

pub async fn open_wallet(
    State(state): State<AppState>,
    Json(request): Json<OpenWalletRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WalletResponse>>), HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_failure(errors));
    }

    let store = WalletStore::new(state.pool.clone());
    let currency = request.currency.as_deref().unwrap_or("NGN");
    let wallet = store
        .open_wallet(request.user_id, currency)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(WalletResponse::from(wallet))),
    ))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<WalletResponse>>, HandlerError> {
    let store = WalletStore::new(state.pool.clone());
    let wallet = store.balance_for_user(user_id).await.map_err(map_error)?;
    Ok(Json(ApiResponse::success(WalletResponse::from(wallet))))
}

pub async fn list_wallet_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<TransactionResponse>>>, HandlerError> {
    let store = WalletStore::new(state.pool.clone());
    let wallet = store.balance_for_user(user_id).await.map_err(map_error)?;

    let status = parse_status(query.status.as_ref())?;
    let limit = query.limit.unwrap_or(50).min(100);
    let offset = query.offset.unwrap_or(0);

    let repo = TransactionRepository::new(state.pool.clone());
    let total = repo
        .count_by_wallet(wallet.id, status)
        .await
        .map_err(map_error)?;
    let transactions = repo
        .list_by_wallet(wallet.id, status, limit, offset)
        .await
        .map_err(map_error)?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
        total,
        limit,
        offset,
    ))))
}

// ============================================================================
// Revenue splits
// ============================================================================

pub async fn get_split_for_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SplitResponse>>, HandlerError> {
    let splitter = RevenueSplitter::new(state.pool.clone(), state.events.clone());
    let split = splitter
        .find_by_transaction(transaction_id)
        .await
        .map_err(map_error)?
        .ok_or_else(|| map_error(AppError::NotFound(format!("split for '{transaction_id}'"))))?;
    Ok(Json(ApiResponse::success(SplitResponse::from(split))))
}

pub async fn get_split_for_related_entity(
    State(state): State<AppState>,
    Path(related_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SplitResponse>>, HandlerError> {
    let splitter = RevenueSplitter::new(state.pool.clone(), state.events.clone());
    let split = splitter
        .find_by_related_entity(related_id)
        .await
        .map_err(map_error)?
        .ok_or_else(|| map_error(AppError::NotFound(format!("split for entity '{related_id}'"))))?;
    Ok(Json(ApiResponse::success(SplitResponse::from(split))))
}

pub async fn get_active_split_settings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RevenueSplitSettings>>, HandlerError> {
    let repo = SplitRepository::new(state.pool.clone());
    let settings = repo
        .active_settings()
        .await
        .map_err(map_error)?
        .ok_or_else(|| map_error(AppError::NotFound("active split settings".to_string())))?;
    Ok(Json(ApiResponse::success(settings)))
}

pub async fn activate_split_settings(
    State(state): State<AppState>,
    Json(request): Json<ActivateSplitSettingsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RevenueSplitSettings>>), HandlerError> {
    let repo = SplitRepository::new(state.pool.clone());
    let settings =
        RevenueSplitSettings::new(request.dealer_percentage, request.platform_percentage);
    let activated = repo.activate_settings(&settings).await.map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(activated))))
}

// ============================================================================
// Withdrawals
// ============================================================================

fn withdrawal_workflow(state: &AppState) -> WithdrawalWorkflow {
    WithdrawalWorkflow::new(
        state.pool.clone(),
        state.gateway.clone(),
        state.events.clone(),
        state.withdrawal_config.clone(),
    )
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WithdrawalResponse>>), HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_failure(errors));
    }

    let workflow = withdrawal_workflow(&state);
    let created = workflow
        .create(request.user_id, request.amount, &request.payout_reference)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(WithdrawalResponse::from(created))),
    ))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, HandlerError> {
    let workflow = withdrawal_workflow(&state);
    let request = workflow.get(id).await.map_err(map_error)?;
    Ok(Json(ApiResponse::success(WithdrawalResponse::from(request))))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Query(query): Query<ListWithdrawalsQuery>,
) -> Result<Json<ApiResponse<Vec<WithdrawalResponse>>>, HandlerError> {
    let workflow = withdrawal_workflow(&state);
    let status = parse_withdrawal_status(query.status.as_ref())?;
    let limit = query.limit.unwrap_or(50).min(100);
    let offset = query.offset.unwrap_or(0);

    let requests = match (query.user_id, status) {
        (Some(user_id), status) => workflow
            .list_for_user(user_id, status, limit, offset)
            .await
            .map_err(map_error)?,
        (None, Some(status)) => workflow
            .list_by_status(status, limit, offset)
            .await
            .map_err(map_error)?,
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(ErrorResponse::new(
                    "VALIDATION_ERROR",
                    "Provide a user_id or a status filter",
                ))),
            ))
        }
    };

    Ok(Json(ApiResponse::success(
        requests.into_iter().map(WithdrawalResponse::from).collect(),
    )))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveWithdrawalRequest>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, HandlerError> {
    let workflow = withdrawal_workflow(&state);
    let approved = workflow
        .approve(id, request.reviewer_id)
        .await
        .map_err(map_error)?;
    Ok(Json(ApiResponse::success(WithdrawalResponse::from(approved))))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectWithdrawalRequest>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, HandlerError> {
    if let Err(errors) = request.validate() {
        return Err(validation_failure(errors));
    }

    let workflow = withdrawal_workflow(&state);
    let rejected = workflow
        .reject(id, request.reviewer_id, &request.reason)
        .await
        .map_err(map_error)?;
    Ok(Json(ApiResponse::success(WithdrawalResponse::from(rejected))))
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelWithdrawalRequest>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, HandlerError> {
    let workflow = withdrawal_workflow(&state);
    let cancelled = workflow
        .cancel(id, request.user_id)
        .await
        .map_err(map_error)?;
    Ok(Json(ApiResponse::success(WithdrawalResponse::from(cancelled))))
}

pub async fn process_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WithdrawalResponse>>, HandlerError> {
    let workflow = withdrawal_workflow(&state);
    let processed = workflow.process(id).await.map_err(map_error)?;
    Ok(Json(ApiResponse::success(WithdrawalResponse::from(processed))))
}

pub async fn withdrawal_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<WithdrawalStatsResponse>>, HandlerError> {
    let workflow = withdrawal_workflow(&state);
    let by_status = workflow.stats().await.map_err(map_error)?;
    Ok(Json(ApiResponse::success(WithdrawalStatsResponse {
        by_status,
    })))
}
