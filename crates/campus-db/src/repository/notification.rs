//! # Notification Repository
//!
//! In-app notifications. Rows are written as a side effect of other
//! operations (a recorded payment, for one) and read by the admin frontend.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use campus_core::validation::validate_required;
use campus_core::Notification;

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, kind, title, message, is_read, created_at, read_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub recipient_id: String,
    /// Machine-readable type, e.g. `payment_received`.
    pub kind: String,
    pub title: String,
    pub message: String,
}

/// Repository for notifications.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    pub async fn create(&self, input: &NewNotification) -> DbResult<Notification> {
        validate_required("recipient_id", &input.recipient_id)?;
        validate_required("title", &input.title)?;

        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: input.recipient_id.clone(),
            kind: input.kind.clone(),
            title: input.title.clone(),
            message: input.message.clone(),
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, title, message, is_read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %notification.id, recipient_id = %notification.recipient_id, kind = %notification.kind, "Notification written");
        Ok(notification)
    }

    /// A recipient's notifications, newest first.
    pub async fn list(&self, recipient_id: &str, unread_only: bool) -> DbResult<Vec<Notification>> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE recipient_id = ?1
              AND (?2 = 0 OR is_read = 0)
            ORDER BY created_at DESC
            "#
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(recipient_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(notifications)
    }

    /// Marks a notification read. Marking it again is a no-op.
    pub async fn mark_read(&self, id: &str) -> DbResult<Notification> {
        let sql = format!(
            r#"
            UPDATE notifications
            SET is_read = 1, read_at = COALESCE(read_at, ?2)
            WHERE id = ?1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Notification", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use campus_core::ErrorKind;

    fn notice(recipient: &str, title: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient.to_string(),
            kind: "announcement".to_string(),
            title: title.to_string(),
            message: "School closes at noon on Friday.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unread_filter_and_mark_read() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = db.notifications().create(&notice("s-1", "Early closing")).await.unwrap();
        db.notifications().create(&notice("s-1", "Sports day")).await.unwrap();
        db.notifications().create(&notice("s-2", "Sports day")).await.unwrap();

        assert_eq!(db.notifications().list("s-1", true).await.unwrap().len(), 2);

        let read = db.notifications().mark_read(&first.id).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());

        let again = db.notifications().mark_read(&first.id).await.unwrap();
        assert_eq!(again.read_at, read.read_at);

        assert_eq!(db.notifications().list("s-1", true).await.unwrap().len(), 1);
        assert_eq!(db.notifications().list("s-1", false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_unknown() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.notifications().mark_read("missing").await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }
}
