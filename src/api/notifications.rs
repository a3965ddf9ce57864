//! Notification listing and read receipts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::{auth::internal_error, ApiError};
use crate::auth::CurrentUser;
use crate::models::Notification;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Notification>> {
    let mut notifications: Vec<Notification> = state
        .notifications
        .read()
        .iter()
        .filter(|n| n.user_id == user.id)
        .cloned()
        .collect();
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(notifications)
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = {
        let mut notifications = state.notifications.write();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user.id)
            .ok_or((StatusCode::NOT_FOUND, "Notification not found".to_string()))?;
        notification.is_read = true;
        notification.clone()
    };

    state
        .persist()
        .map_err(|e| internal_error("Failed to save notification", e))?;
    Ok(Json(notification))
}
