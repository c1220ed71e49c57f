//! # REST API for Invoices
//!
//! ```text
//! POST /api/invoices               { studentId, billingMonth: "2025-03" }
//! POST /api/classes/{id}/invoices  { billingMonth }         → { success, failed }
//! GET  /api/invoices?studentId=&status=&billingMonth=
//! GET  /api/invoices/{id}          invoice + items + payments
//! POST /api/invoices/mark-overdue  { asOf }? (body optional) → { updated }
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use campus_core::{BillingMonth, BulkResult, FeeInvoice};
use campus_db::{InvoiceDetail, InvoiceFilter, InvoiceTarget};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInvoiceRequest {
    pub student_id: String,
    pub billing_month: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateClassInvoicesRequest {
    pub billing_month: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOverdueRequest {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOverdueResponse {
    pub as_of: NaiveDate,
    pub updated: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices).post(generate_invoice))
        .route("/invoices/mark-overdue", post(mark_overdue))
        .route("/invoices/{id}", get(get_invoice))
        .route("/classes/{id}/invoices", post(generate_class_invoices))
}

/// Bill one student for one month
pub async fn generate_invoice(
    State(state): State<AppState>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<InvoiceDetail>)> {
    info!("POST /api/invoices - {} for {}", request.student_id, request.billing_month);
    let month: BillingMonth = request.billing_month.parse()?;
    let invoice = state
        .db
        .invoices()
        .generate(&request.student_id, month, request.created_by.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Bill every active student of a class
pub async fn generate_class_invoices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<GenerateClassInvoicesRequest>,
) -> ApiResult<Json<BulkResult<FeeInvoice, InvoiceTarget>>> {
    info!("POST /api/classes/{}/invoices - {}", id, request.billing_month);
    let month: BillingMonth = request.billing_month.parse()?;
    let result = state
        .db
        .invoices()
        .generate_for_class(&id, month, request.created_by.as_deref())
        .await?;
    Ok(Json(result))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
) -> ApiResult<Json<Vec<FeeInvoice>>> {
    info!("GET /api/invoices - {:?}", filter);
    Ok(Json(state.db.invoices().list(&filter).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    info!("GET /api/invoices/{}", id);
    Ok(Json(state.db.invoices().get(&id).await?))
}

/// Flag unpaid invoices past their due date; defaults to today
pub async fn mark_overdue(
    State(state): State<AppState>,
    request: Option<Json<MarkOverdueRequest>>,
) -> ApiResult<Json<MarkOverdueResponse>> {
    let as_of = request
        .and_then(|Json(request)| request.as_of)
        .unwrap_or_else(|| Utc::now().date_naive());
    info!("POST /api/invoices/mark-overdue - as of {}", as_of);
    let updated = state.db.invoices().mark_overdue(as_of).await?;
    Ok(Json(MarkOverdueResponse { as_of, updated }))
}
