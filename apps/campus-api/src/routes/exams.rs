//! # REST API for Exams and Results

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use campus_core::{BulkResult, Exam, ExamResult};
use campus_db::{NewExam, ResultEntry};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exams", post(create_exam))
        .route("/exams/{id}", get(get_exam))
        .route("/exams/{id}/results", get(exam_results).post(record_results))
        .route("/classes/{id}/exams", get(list_exams))
}

pub async fn create_exam(
    State(state): State<AppState>,
    Json(request): Json<NewExam>,
) -> ApiResult<(StatusCode, Json<Exam>)> {
    info!("POST /api/exams - {} for class {}", request.name, request.class_id);
    let exam = state.db.exams().create(&request).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Exam>> {
    info!("GET /api/exams/{}", id);
    Ok(Json(state.db.exams().get(&id).await?))
}

pub async fn list_exams(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Exam>>> {
    info!("GET /api/classes/{}/exams", id);
    Ok(Json(state.db.exams().list_for_class(&id).await?))
}

/// Enter scores; out-of-range scores come back under `failed`
pub async fn record_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(entries): Json<Vec<ResultEntry>>,
) -> ApiResult<Json<BulkResult<ExamResult, ResultEntry>>> {
    info!("POST /api/exams/{}/results - {} entries", id, entries.len());
    Ok(Json(state.db.exams().record_results(&id, entries).await?))
}

pub async fn exam_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ExamResult>>> {
    info!("GET /api/exams/{}/results", id);
    Ok(Json(state.db.exams().results(&id).await?))
}
