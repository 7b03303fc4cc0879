//! Notification endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{notification::NotificationQuery, Notification},
};

/// Unread notifications of a recipient
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(
        ("recipient" = String, Query, description = "Recipient address")
    ),
    responses(
        (status = 200, description = "Unread notifications", body = Vec<Notification>)
    )
)]
pub async fn list_unread(
    State(state): State<crate::AppState>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state.services.notifications.unread_for(&query.recipient).await?;
    Ok(Json(notifications))
}

/// Mark a notification as read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Notification>> {
    let notification = state.services.notifications.mark_read(id).await?;
    Ok(Json(notification))
}
