//! In-app notification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub recipient: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct NotificationQuery {
    pub recipient: String,
}

pub fn new_book_message(title: &str) -> String {
    format!("A new book titled '{}' is now available in the library!", title)
}
