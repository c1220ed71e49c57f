//! # REST API for Fee Structures and Discounts
//!
//! A structure already billed on an invoice rejects edits with 409; it can
//! still be deactivated so it stops appearing on new invoices.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use tracing::info;

use campus_core::{FeeDiscount, FeeStructure, StudentFeeDiscount};
use campus_db::{
    DiscountAssignment, FeeStructureFilter, FeeStructureUpdate, NewDiscount, NewFeeStructure,
};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fees/structures", get(list_structures).post(create_structure))
        .route(
            "/fees/structures/{id}",
            get(get_structure).put(update_structure).delete(deactivate_structure),
        )
        .route("/fees/discounts", get(list_discounts).post(create_discount))
        .route("/fees/discounts/{id}", delete(deactivate_discount))
        .route(
            "/students/{id}/discounts",
            get(student_discounts).post(assign_discount),
        )
}

pub async fn create_structure(
    State(state): State<AppState>,
    Json(request): Json<NewFeeStructure>,
) -> ApiResult<(StatusCode, Json<FeeStructure>)> {
    info!("POST /api/fees/structures - {} ({})", request.name, request.academic_year);
    let structure = state.db.fees().create_structure(&request).await?;
    Ok((StatusCode::CREATED, Json(structure)))
}

pub async fn list_structures(
    State(state): State<AppState>,
    Query(filter): Query<FeeStructureFilter>,
) -> ApiResult<Json<Vec<FeeStructure>>> {
    info!("GET /api/fees/structures - {:?}", filter);
    Ok(Json(state.db.fees().list_structures(&filter).await?))
}

pub async fn get_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FeeStructure>> {
    info!("GET /api/fees/structures/{}", id);
    Ok(Json(state.db.fees().get_structure(&id).await?))
}

pub async fn update_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FeeStructureUpdate>,
) -> ApiResult<Json<FeeStructure>> {
    info!("PUT /api/fees/structures/{}", id);
    Ok(Json(state.db.fees().update_structure(&id, &request).await?))
}

pub async fn deactivate_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/fees/structures/{}", id);
    state.db.fees().deactivate_structure(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_discount(
    State(state): State<AppState>,
    Json(request): Json<NewDiscount>,
) -> ApiResult<(StatusCode, Json<FeeDiscount>)> {
    info!("POST /api/fees/discounts - {}", request.name);
    let discount = state.db.fees().create_discount(&request).await?;
    Ok((StatusCode::CREATED, Json(discount)))
}

pub async fn list_discounts(State(state): State<AppState>) -> ApiResult<Json<Vec<FeeDiscount>>> {
    info!("GET /api/fees/discounts");
    Ok(Json(state.db.fees().list_discounts().await?))
}

pub async fn deactivate_discount(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/fees/discounts/{}", id);
    state.db.fees().deactivate_discount(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant a discount to a student for a validity window
pub async fn assign_discount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DiscountAssignment>,
) -> ApiResult<(StatusCode, Json<StudentFeeDiscount>)> {
    info!("POST /api/students/{}/discounts - {}", id, request.discount_id);
    let assignment = state.db.fees().assign_discount(&id, &request).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn student_discounts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StudentFeeDiscount>>> {
    info!("GET /api/students/{}/discounts", id);
    Ok(Json(state.db.fees().student_discounts(&id).await?))
}
