//! # REST API for Classes

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use campus_core::{SchoolClass, Student};
use campus_db::{NewClass, StudentFilter};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassListQuery {
    pub academic_year: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/{id}", get(get_class).delete(deactivate_class))
        .route("/classes/{id}/students", get(class_students))
}

pub async fn create_class(
    State(state): State<AppState>,
    Json(request): Json<NewClass>,
) -> ApiResult<(StatusCode, Json<SchoolClass>)> {
    info!("POST /api/classes - {} ({})", request.name, request.academic_year);
    let class = state.db.classes().create(&request).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn list_classes(
    State(state): State<AppState>,
    Query(query): Query<ClassListQuery>,
) -> ApiResult<Json<Vec<SchoolClass>>> {
    info!("GET /api/classes");
    Ok(Json(state.db.classes().list(query.academic_year.as_deref()).await?))
}

pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SchoolClass>> {
    info!("GET /api/classes/{}", id);
    Ok(Json(state.db.classes().get(&id).await?))
}

pub async fn deactivate_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/classes/{}", id);
    state.db.classes().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Active students of a class
pub async fn class_students(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Student>>> {
    info!("GET /api/classes/{}/students", id);
    state.db.classes().get(&id).await?;
    let filter = StudentFilter {
        class_id: Some(id),
        include_inactive: false,
    };
    Ok(Json(state.db.students().list(&filter).await?))
}
