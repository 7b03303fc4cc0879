//! Notifications repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::Notification,
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, recipient: &str, message: &str) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient, message)
            VALUES ($1, $2)
            RETURNING id, recipient, message, created_at, read
            "#,
        )
        .bind(recipient)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;
        Ok(notification)
    }

    pub async fn unread_for(&self, recipient: &str) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient, message, created_at, read
            FROM notifications
            WHERE recipient = $1 AND read = FALSE
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(recipient)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    pub async fn mark_read(&self, id: i64) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET read = TRUE
            WHERE id = $1
            RETURNING id, recipient, message, created_at, read
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification with id {} not found", id)))
    }
}
