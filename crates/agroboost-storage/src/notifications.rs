//! Notification storage.
//!
//! Append-only alert/event log. The only supported mutation is marking a
//! notification read, which is owner-scoped and idempotent.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// Notifications table: key = notification id (uuid), value = Notification (JSON)
const NOTIFICATIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("notifications");

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    /// Informational message.
    #[default]
    Info,
    /// A requested action completed.
    Success,
    /// Something needs attention soon.
    Warning,
    /// A safety threshold was breached.
    Alert,
    /// An operation failed.
    Error,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Alert => "alert",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One notification. Immutable except `is_read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// The kit this notification refers to.
    pub kit_id: Uuid,
    /// Short title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// Category.
    pub category: NotificationCategory,
    /// Read flag; transitions false -> true exactly once logically.
    pub is_read: bool,
    /// Optional call-to-action label for the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification stamped with the current time.
    pub fn new(
        owner_id: Uuid,
        kit_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kit_id,
            title: title.into(),
            message: message.into(),
            category,
            is_read: false,
            action_label: None,
            timestamp: Utc::now(),
        }
    }
}

/// Notification store backed by redb.
pub struct NotificationStore {
    db: Arc<Database>,
}

impl NotificationStore {
    /// Open a notification store under the given data directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db = Database::create(dir.join("notifications.redb"))?;
        Self::init(db)
    }

    /// Create an in-memory notification store for testing.
    pub fn memory() -> Result<Self> {
        let path =
            std::env::temp_dir().join(format!("notifications_{}.redb", Uuid::new_v4().simple()));
        let db = Database::create(path)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(NOTIFICATIONS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append a notification.
    pub fn append(&self, notification: &Notification) -> Result<()> {
        let id = notification.id.to_string();
        let json = serde_json::to_string(notification)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(NOTIFICATIONS_TABLE)?;
            table.insert(id.as_str(), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a notification by id.
    pub fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        let json = table
            .get(id.to_string().as_str())?
            .map(|v| v.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// List all notifications for an owner, newest-first.
    pub fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Notification>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;

        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry.map_err(|e| Error::Storage(e.to_string()))?;
            let notification: Notification = serde_json::from_str(value.value())?;
            if notification.owner_id == owner_id {
                result.push(notification);
            }
        }

        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(result)
    }

    /// Mark a notification read, scoped to the owning user. Idempotent:
    /// marking an already-read notification succeeds without touching any
    /// other field. A notification that does not exist or belongs to a
    /// different owner is `NotFound`.
    pub fn mark_read(&self, owner_id: Uuid, id: Uuid) -> Result<Notification> {
        let key = id.to_string();

        let write_txn = self.db.begin_write()?;
        let notification = {
            let mut table = write_txn.open_table(NOTIFICATIONS_TABLE)?;
            let json = table.get(key.as_str())?.map(|v| v.value().to_string());
            let json = json.ok_or_else(|| Error::NotFound(format!("notification {}", id)))?;

            let mut notification: Notification = serde_json::from_str(&json)?;
            if notification.owner_id != owner_id {
                return Err(Error::NotFound(format!("notification {}", id)));
            }

            if !notification.is_read {
                notification.is_read = true;
                let json = serde_json::to_string(&notification)?;
                table.insert(key.as_str(), json.as_str())?;
            }
            notification
        };
        write_txn.commit()?;
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_newest_first_and_owner_scoped() {
        let store = NotificationStore::memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let kit = Uuid::new_v4();

        let mut first = Notification::new(alice, kit, "Low battery", "at 15%", NotificationCategory::Alert);
        first.timestamp = Utc::now() - chrono::Duration::minutes(5);
        let second = Notification::new(alice, kit, "Pump started", "manual", NotificationCategory::Success);
        let other = Notification::new(bob, kit, "Low battery", "at 12%", NotificationCategory::Alert);

        store.append(&first).unwrap();
        store.append(&second).unwrap();
        store.append(&other).unwrap();

        let listed = store.list_for_owner(alice).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "Pump started");
        assert_eq!(listed[1].title, "Low battery");
    }

    #[test]
    fn test_mark_read_idempotent() {
        let store = NotificationStore::memory().unwrap();
        let owner = Uuid::new_v4();
        let note = Notification::new(
            owner,
            Uuid::new_v4(),
            "Critical water level",
            "do not run the pump dry",
            NotificationCategory::Alert,
        );
        store.append(&note).unwrap();

        let first = store.mark_read(owner, note.id).unwrap();
        assert!(first.is_read);

        let second = store.mark_read(owner, note.id).unwrap();
        assert!(second.is_read);
        // Everything else is untouched.
        assert_eq!(second.message, note.message);
        assert_eq!(second.timestamp, note.timestamp);
        assert_eq!(second.category, NotificationCategory::Alert);
    }

    #[test]
    fn test_mark_read_is_owner_scoped() {
        let store = NotificationStore::memory().unwrap();
        let owner = Uuid::new_v4();
        let note = Notification::new(
            owner,
            Uuid::new_v4(),
            "Low battery",
            "at 10%",
            NotificationCategory::Alert,
        );
        store.append(&note).unwrap();

        let err = store.mark_read(Uuid::new_v4(), note.id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = store.mark_read(owner, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
