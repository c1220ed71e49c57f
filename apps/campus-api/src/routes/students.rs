//! # REST API for Students
//!
//! Admission, profile updates, soft delete and bulk import.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use campus_core::{BulkResult, Student};
use campus_db::{NewStudent, StudentFilter, StudentUpdate};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route("/students/import", post(import_students))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(deactivate_student),
        )
}

/// Admit a student
pub async fn create_student(
    State(state): State<AppState>,
    Json(request): Json<NewStudent>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    info!("POST /api/students - {} {}", request.first_name, request.last_name);
    let student = state.db.students().create(&request).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// List students, optionally by class
pub async fn list_students(
    State(state): State<AppState>,
    Query(filter): Query<StudentFilter>,
) -> ApiResult<Json<Vec<Student>>> {
    info!("GET /api/students - {:?}", filter);
    Ok(Json(state.db.students().list(&filter).await?))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Student>> {
    info!("GET /api/students/{}", id);
    Ok(Json(state.db.students().get(&id).await?))
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StudentUpdate>,
) -> ApiResult<Json<Student>> {
    info!("PUT /api/students/{}", id);
    Ok(Json(state.db.students().update(&id, &request).await?))
}

pub async fn deactivate_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/students/{}", id);
    state.db.students().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admit many students; rejected rows come back under `failed`
pub async fn import_students(
    State(state): State<AppState>,
    Json(rows): Json<Vec<NewStudent>>,
) -> ApiResult<Json<BulkResult<Student, NewStudent>>> {
    info!("POST /api/students/import - {} rows", rows.len());
    Ok(Json(state.db.students().import(rows).await?))
}
