use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::auth::repo::User;
use crate::payments::ledger::Transaction;

/// Whole-collection snapshot persistence. Every write serializes the full
/// collection; there is no partial update or indexing.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_users(&self) -> anyhow::Result<Vec<User>>;
    async fn save_users(&self, users: &[User]) -> anyhow::Result<()>;
    async fn load_transactions(&self) -> anyhow::Result<Vec<Transaction>>;
    async fn save_transactions(&self, transactions: &[Transaction]) -> anyhow::Result<()>;
}

/// JSON files under a data directory, one per collection. Missing or
/// unreadable files load as empty collections.
pub struct JsonFileStore {
    users_path: PathBuf,
    transactions_path: PathBuf,
}

impl JsonFileStore {
    pub async fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create data dir {}", dir.display()))?;
        let store = Self {
            users_path: dir.join("users.json"),
            transactions_path: dir.join("transactions.json"),
        };
        seed_file(&store.users_path).await?;
        seed_file(&store.transactions_path).await?;
        Ok(store)
    }

    async fn read_collection<T>(&self, path: &Path) -> anyhow::Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let raw = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }
        match serde_json::from_slice(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable snapshot, starting collection empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write_collection<T>(&self, path: &Path, items: &[T]) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let body = serde_json::to_vec_pretty(items)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

async fn seed_file(path: &Path) -> anyhow::Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    tokio::fs::write(path, b"[]")
        .await
        .with_context(|| format!("seed {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load_users(&self) -> anyhow::Result<Vec<User>> {
        self.read_collection(&self.users_path).await
    }

    async fn save_users(&self, users: &[User]) -> anyhow::Result<()> {
        self.write_collection(&self.users_path, users).await
    }

    async fn load_transactions(&self) -> anyhow::Result<Vec<Transaction>> {
        self.read_collection(&self.transactions_path).await
    }

    async fn save_transactions(&self, transactions: &[Transaction]) -> anyhow::Result<()> {
        self.write_collection(&self.transactions_path, transactions).await
    }
}

/// In-memory store backing `AppState::fake()` and tests.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    transactions: Mutex<Vec<Transaction>>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.lock().await.clone())
    }

    async fn save_users(&self, users: &[User]) -> anyhow::Result<()> {
        *self.users.lock().await = users.to_vec();
        Ok(())
    }

    async fn load_transactions(&self) -> anyhow::Result<Vec<Transaction>> {
        Ok(self.transactions.lock().await.clone())
    }

    async fn save_transactions(&self, transactions: &[Transaction]) -> anyhow::Result<()> {
        *self.transactions.lock().await = transactions.to_vec();
        Ok(())
    }
}
