//! User account storage for the auth layer.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// Users table: key = user id (uuid), value = User (JSON)
const USERS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("users");

// Username index: key = username, value = user id
const USERNAME_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("users_by_name");

/// An account that owns kits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// bcrypt hash of the password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

/// User store backed by redb.
pub struct UserStore {
    db: Arc<Database>,
}

impl UserStore {
    /// Open a user store under the given data directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db = Database::create(dir.join("users.redb"))?;
        Self::init(db)
    }

    /// Create an in-memory user store for testing.
    pub fn memory() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("users_{}.redb", Uuid::new_v4().simple()));
        let db = Database::create(path)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(USERS_TABLE)?;
            write_txn.open_table(USERNAME_INDEX_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert a new user. Usernames are unique.
    pub fn insert(&self, user: &User) -> Result<()> {
        let id = user.id.to_string();
        let json = serde_json::to_string(user)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut index = write_txn.open_table(USERNAME_INDEX_TABLE)?;
            let taken = index.get(user.username.as_str())?.is_some();
            if taken {
                return Err(Error::InvalidInput(format!(
                    "username already taken: {}",
                    user.username
                )));
            }
            index.insert(user.username.as_str(), id.as_str())?;

            let mut users = write_txn.open_table(USERS_TABLE)?;
            users.insert(id.as_str(), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a user by id.
    pub fn get(&self, id: Uuid) -> Result<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS_TABLE)?;
        let json = users
            .get(id.to_string().as_str())?
            .map(|v| v.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get a user by username.
    pub fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USERNAME_INDEX_TABLE)?;
        let id = index.get(username)?.map(|v| v.value().to_string());
        let id = match id {
            Some(id) => id,
            None => return Ok(None),
        };
        let users = read_txn.open_table(USERS_TABLE)?;
        let json = users.get(id.as_str())?.map(|v| v.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let store = UserStore::memory().unwrap();
        let user = User::new("marie", "$2b$12$fakehash");
        store.insert(&user).unwrap();

        let found = store.get_by_username("marie").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(store.get_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let store = UserStore::memory().unwrap();
        store.insert(&User::new("marie", "h1")).unwrap();
        let err = store.insert(&User::new("marie", "h2")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
