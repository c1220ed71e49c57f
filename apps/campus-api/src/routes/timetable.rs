//! # REST API for the Timetable
//!
//! Double bookings come back as 409 with the conflict message
//! ("Class is already booked for this period", ...).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use campus_core::TimetableEntry;
use campus_db::{NewTimetableEntry, TimetableUpdate};

use crate::error::ApiResult;
use crate::AppState;

/// `?year=2025`
#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/timetable", post(create_entry))
        .route(
            "/timetable/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
        .route("/classes/{id}/timetable", get(class_timetable))
}

/// Book a lesson
pub async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<NewTimetableEntry>,
) -> ApiResult<(StatusCode, Json<TimetableEntry>)> {
    info!(
        "POST /api/timetable - class {} period {} day {}",
        request.class_id, request.period_id, request.day_of_week
    );
    let entry = state.db.timetable().create(&request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimetableEntry>> {
    info!("GET /api/timetable/{}", id);
    Ok(Json(state.db.timetable().get(&id).await?))
}

/// Move or reassign a lesson; re-checked against every other booking
pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TimetableUpdate>,
) -> ApiResult<Json<TimetableEntry>> {
    info!("PUT /api/timetable/{}", id);
    Ok(Json(state.db.timetable().update(&id, &request).await?))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/timetable/{}", id);
    state.db.timetable().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn class_timetable(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<Vec<TimetableEntry>>> {
    info!("GET /api/classes/{}/timetable?year={}", id, query.year);
    Ok(Json(state.db.timetable().class_timetable(&id, &query.year).await?))
}
