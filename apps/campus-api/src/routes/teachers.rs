//! # REST API for Teachers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use campus_core::{Teacher, TimetableEntry};
use campus_db::{NewTeacher, TeacherUpdate};

use super::timetable::YearQuery;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/teachers", get(list_teachers).post(create_teacher))
        .route(
            "/teachers/{id}",
            get(get_teacher).put(update_teacher).delete(deactivate_teacher),
        )
        .route("/teachers/{id}/timetable", get(teacher_timetable))
}

pub async fn create_teacher(
    State(state): State<AppState>,
    Json(request): Json<NewTeacher>,
) -> ApiResult<(StatusCode, Json<Teacher>)> {
    info!("POST /api/teachers - {}", request.email);
    let teacher = state.db.teachers().create(&request).await?;
    Ok((StatusCode::CREATED, Json(teacher)))
}

pub async fn list_teachers(
    State(state): State<AppState>,
    Query(query): Query<TeacherListQuery>,
) -> ApiResult<Json<Vec<Teacher>>> {
    info!("GET /api/teachers");
    Ok(Json(state.db.teachers().list(query.include_inactive).await?))
}

pub async fn get_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Teacher>> {
    info!("GET /api/teachers/{}", id);
    Ok(Json(state.db.teachers().get(&id).await?))
}

pub async fn update_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TeacherUpdate>,
) -> ApiResult<Json<Teacher>> {
    info!("PUT /api/teachers/{}", id);
    Ok(Json(state.db.teachers().update(&id, &request).await?))
}

pub async fn deactivate_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/teachers/{}", id);
    state.db.teachers().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A teacher's weekly lessons for one academic year
pub async fn teacher_timetable(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<Vec<TimetableEntry>>> {
    info!("GET /api/teachers/{}/timetable?year={}", id, query.year);
    Ok(Json(state.db.timetable().teacher_timetable(&id, &query.year).await?))
}
