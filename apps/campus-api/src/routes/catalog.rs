//! # REST API for Timetable Reference Data
//!
//! Subjects, rooms and periods. Create and list only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use campus_core::{Period, Room, Subject};
use campus_db::{NewPeriod, NewRoom, NewSubject};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subjects", get(list_subjects).post(create_subject))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/periods", get(list_periods).post(create_period))
}

pub async fn create_subject(
    State(state): State<AppState>,
    Json(request): Json<NewSubject>,
) -> ApiResult<(StatusCode, Json<Subject>)> {
    info!("POST /api/subjects - {}", request.code);
    let subject = state.db.catalog().create_subject(&request).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn list_subjects(State(state): State<AppState>) -> ApiResult<Json<Vec<Subject>>> {
    info!("GET /api/subjects");
    Ok(Json(state.db.catalog().list_subjects().await?))
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<NewRoom>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    info!("POST /api/rooms - {}", request.name);
    let room = state.db.catalog().create_room(&request).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn list_rooms(State(state): State<AppState>) -> ApiResult<Json<Vec<Room>>> {
    info!("GET /api/rooms");
    Ok(Json(state.db.catalog().list_rooms().await?))
}

pub async fn create_period(
    State(state): State<AppState>,
    Json(request): Json<NewPeriod>,
) -> ApiResult<(StatusCode, Json<Period>)> {
    info!("POST /api/periods - {}", request.name);
    let period = state.db.catalog().create_period(&request).await?;
    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn list_periods(State(state): State<AppState>) -> ApiResult<Json<Vec<Period>>> {
    info!("GET /api/periods");
    Ok(Json(state.db.catalog().list_periods().await?))
}
