//! # REST API for Attendance

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use campus_core::{AttendanceRecord, BulkResult};
use campus_db::{AttendanceEntry, AttendanceSummary, MarkAttendance};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/classes/{id}/attendance",
            get(class_attendance).post(mark_attendance),
        )
        .route("/students/{id}/attendance", get(student_summary))
}

/// Submit a day's register; students of other classes come back under `failed`
pub async fn mark_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(register): Json<MarkAttendance>,
) -> ApiResult<Json<BulkResult<AttendanceRecord, AttendanceEntry>>> {
    info!(
        "POST /api/classes/{}/attendance - {} ({} entries)",
        id,
        register.date,
        register.entries.len()
    );
    Ok(Json(state.db.attendance().mark(&id, register).await?))
}

pub async fn class_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<AttendanceRecord>>> {
    info!("GET /api/classes/{}/attendance?date={}", id, query.date);
    Ok(Json(state.db.attendance().for_class(&id, query.date).await?))
}

pub async fn student_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<AttendanceSummary>> {
    info!("GET /api/students/{}/attendance?from={}&to={}", id, range.from, range.to);
    Ok(Json(
        state
            .db
            .attendance()
            .student_summary(&id, range.from, range.to)
            .await?,
    ))
}
