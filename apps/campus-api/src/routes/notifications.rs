//! # REST API for Notifications

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use campus_core::Notification;
use campus_db::NewNotification;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    pub recipient_id: String,
    #[serde(default)]
    pub unread_only: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications).post(create_notification))
        .route("/notifications/{id}/read", post(mark_read))
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<NewNotification>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    info!("POST /api/notifications - {} to {}", request.kind, request.recipient_id);
    let notification = state.db.notifications().create(&request).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    info!(
        "GET /api/notifications?recipientId={}&unreadOnly={}",
        query.recipient_id, query.unread_only
    );
    Ok(Json(
        state
            .db
            .notifications()
            .list(&query.recipient_id, query.unread_only)
            .await?,
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    info!("POST /api/notifications/{}/read", id);
    Ok(Json(state.db.notifications().mark_read(&id).await?))
}
