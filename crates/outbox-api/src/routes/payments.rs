//! Routes for the payments context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::patch, routing::post};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use outbox_core::error::DomainError;
use outbox_payments::application::command_handlers;
use outbox_payments::domain::commands;
use outbox_payments::domain::payment::{Payment, PaymentStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /payments.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Paying user.
    pub user_id: i64,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Initial status; defaults to `pending`.
    #[serde(default)]
    pub status: Option<PaymentStatus>,
}

/// Request body for PATCH /payments/{id}.
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    /// Target status.
    pub status: PaymentStatus,
}

/// POST /payments
#[instrument(skip(state, request), fields(user_id = request.user_id))]
async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let command = commands::CreatePayment {
        correlation_id: Uuid::new_v4(),
        user_id: request.user_id,
        amount: request.amount,
        status: request.status,
    };

    info!(correlation_id = %command.correlation_id, "handling create_payment command");

    let payment = command_handlers::handle_create_payment(
        &command,
        state.clock.as_ref(),
        &*state.payment_repository,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// PATCH /payments/{id}
#[instrument(skip(state, request), fields(payment_id = id))]
async fn update_payment_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
    let command = commands::UpdatePaymentStatus {
        correlation_id: Uuid::new_v4(),
        payment_id: id,
        status: request.status,
    };

    info!(
        correlation_id = %command.correlation_id,
        status = %command.status,
        "handling update_payment_status command"
    );

    let payment = command_handlers::handle_update_payment_status(
        &command,
        state.clock.as_ref(),
        &*state.payment_repository,
    )
    .await?;

    Ok(Json(payment))
}

/// GET /payments/{id}
#[instrument(skip(state))]
async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state
        .payment_repository
        .find(id)
        .await?
        .ok_or_else(|| DomainError::not_found("payment", id))?;

    Ok(Json(payment))
}

/// Returns the router for the payments context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment))
        .route(
            "/payments/{id}",
            patch(update_payment_status).get(get_payment),
        )
}
