//! Notification sink
//!
//! Notifications are stored as rows and read back by their recipient. Delivery
//! is best effort: the operation that triggered it has already committed.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{notification::new_book_message, Notification},
    repository::Repository,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Tell `recipient` that a book titled `title` joined the catalog
    async fn notify_new_book(&self, recipient: &str, title: &str) -> AppResult<()>;
}

/// Deliver a new-book notification without ever failing the caller.
/// Returns whether the notification was recorded.
pub async fn dispatch_new_book(sink: &dyn NotificationSink, recipient: &str, title: &str) -> bool {
    match sink.notify_new_book(recipient, title).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(recipient, title, "Failed to send new book notification: {}", e);
            false
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    repository: Repository,
}

impl NotificationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Unread notifications of a recipient, newest first
    pub async fn unread_for(&self, recipient: &str) -> AppResult<Vec<Notification>> {
        self.repository.notifications.unread_for(recipient).await
    }

    pub async fn mark_read(&self, id: i64) -> AppResult<Notification> {
        self.repository.notifications.mark_read(id).await
    }
}

#[async_trait]
impl NotificationSink for NotificationService {
    async fn notify_new_book(&self, recipient: &str, title: &str) -> AppResult<()> {
        let notification = self
            .repository
            .notifications
            .create(recipient, &new_book_message(title))
            .await?;
        tracing::debug!(id = notification.id, recipient, "New book notification recorded");
        Ok(())
    }
}
