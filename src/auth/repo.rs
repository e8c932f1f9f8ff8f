use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::Store;

/// User record as persisted in the directory snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// JSON-snapshot-backed user directory. Lookups are linear scans; writes go
/// through a single mutex so check-then-insert cycles cannot interleave.
pub struct UserDirectory {
    store: Arc<dyn Store>,
    write_lock: Mutex<()>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Find a user by lowercased email.
    pub async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.store.load_users().await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    pub async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.store.load_users().await?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    /// Create a user. Returns `None` when the email is already registered.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.store.load_users().await?;
        if users.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        self.store.save_users(&users).await?;
        Ok(Some(user))
    }
}
