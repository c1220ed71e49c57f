//! # REST API for Payments
//!
//! Counter payments settle immediately. Mobile-money payments are created
//! pending and settled by the gateway callback.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use campus_core::FeePayment;
use campus_db::{MobileConfirmation, MobilePaymentRequest, NewPayment, PaymentReceipt};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(record_payment))
        .route("/payments/mobile", post(initiate_mobile_payment))
        .route("/payments/mobile/callback", post(complete_mobile_payment))
        .route("/payments/receipts/{number}", get(get_by_receipt))
        .route("/invoices/{id}/payments", get(list_payments))
}

/// Record a cash, bank or cheque payment
pub async fn record_payment(
    State(state): State<AppState>,
    Json(request): Json<NewPayment>,
) -> ApiResult<(StatusCode, Json<PaymentReceipt>)> {
    info!(
        "POST /api/payments - invoice {} amount {}",
        request.invoice_id, request.amount_cents
    );
    let receipt = state.db.payments().record(&request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Start a mobile-money checkout
pub async fn initiate_mobile_payment(
    State(state): State<AppState>,
    Json(request): Json<MobilePaymentRequest>,
) -> ApiResult<(StatusCode, Json<FeePayment>)> {
    info!(
        "POST /api/payments/mobile - invoice {} amount {}",
        request.invoice_id, request.amount_cents
    );
    let payment = state.db.payments().initiate_mobile(&request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Gateway confirmation for a pending mobile payment
pub async fn complete_mobile_payment(
    State(state): State<AppState>,
    Json(confirmation): Json<MobileConfirmation>,
) -> ApiResult<Json<PaymentReceipt>> {
    info!(
        "POST /api/payments/mobile/callback - {} success={}",
        confirmation.checkout_reference, confirmation.success
    );
    Ok(Json(state.db.payments().complete_mobile(&confirmation).await?))
}

pub async fn get_by_receipt(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Json<FeePayment>> {
    info!("GET /api/payments/receipts/{}", number);
    Ok(Json(state.db.payments().get_by_receipt(&number).await?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<FeePayment>>> {
    info!("GET /api/invoices/{}/payments", id);
    Ok(Json(state.db.payments().list_for_invoice(&id).await?))
}
