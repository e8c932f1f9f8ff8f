use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

/// Ledger record for one push-payment attempt. Created in `Pending` at
/// initiation; the callback reconciler moves it to `Success` or `Failed`
/// exactly once. Records are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub amount: u64,
    pub payer_phone: String,
    pub receiver_phone: String,
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub response_code: Option<String>,
    pub response_description: Option<String>,
    pub customer_message: Option<String>,
    pub status: TxStatus,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub metadata: Option<serde_json::Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub callback_received_at: Option<OffsetDateTime>,
}

/// Append-only transaction ledger over the snapshot store, keyed by the
/// provider-issued checkout-request id. Each read-modify-write cycle runs
/// under a single mutex.
pub struct Ledger {
    store: Arc<dyn Store>,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, transaction: Transaction) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.store.load_transactions().await?;
        all.push(transaction);
        self.store.save_transactions(&all).await
    }

    pub async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> anyhow::Result<Option<Transaction>> {
        let all = self.store.load_transactions().await?;
        Ok(all
            .into_iter()
            .find(|t| t.checkout_request_id.as_deref() == Some(checkout_request_id)))
    }

    /// Swap in an updated record. Returns `false` when no entry carries the
    /// checkout-request id.
    pub async fn replace(
        &self,
        checkout_request_id: &str,
        updated: Transaction,
    ) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.store.load_transactions().await?;
        let Some(slot) = all
            .iter_mut()
            .find(|t| t.checkout_request_id.as_deref() == Some(checkout_request_id))
        else {
            return Ok(false);
        };
        *slot = updated;
        self.store.save_transactions(&all).await?;
        Ok(true)
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Transaction>> {
        self.store.load_transactions().await
    }
}
