//! Async image store (the `images` partition)
//!
//! Images are stored as data-URL strings under a logical id. The store does
//! no validation; MIME/size checks and compression happen before `put`.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::Result;
use super::database::Database;

/// One stored image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    pub id: String,
    /// Data-URL encoded bytes
    pub data: String,
    /// Category tag, e.g. "avatar" or "wallpaper"
    pub kind: String,
    /// Milliseconds since the Unix epoch of the last write
    pub created_at: i64,
}

/// Storage usage as reported by [`BlobStore::estimate_usage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
}

impl StorageUsage {
    /// Fraction of the quota in use, 0.0 when the quota is zero
    pub fn ratio(&self) -> f64 {
        if self.quota_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.quota_bytes as f64
        }
    }
}

/// Async id → image store
#[derive(Clone)]
pub struct BlobStore {
    db: Arc<Database>,
    quota_bytes: Option<u64>,
}

impl BlobStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db, quota_bytes: None }
    }

    /// Report `quota_bytes` from [`BlobStore::estimate_usage`]
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Store `data` under `id`, replacing any previous image with that id
    pub async fn put(&self, id: &str, data: &str, kind: &str) -> Result<()> {
        let record = BlobRecord {
            id: id.to_string(),
            data: data.to_string(),
            kind: kind.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        tracing::debug!("Storing image {} ({}, {} chars)", record.id, record.kind, record.data.len());
        self.db.run(move |store| store.put_image(&record)).await
    }

    /// Data-URL for `id`, `None` when absent
    pub async fn get(&self, id: &str) -> Result<Option<String>> {
        Ok(self.record(id).await?.map(|record| record.data))
    }

    /// Full record for `id`
    pub async fn record(&self, id: &str) -> Result<Option<BlobRecord>> {
        let id = id.to_string();
        self.db.run(move |store| store.get_image(&id)).await
    }

    /// Delete `id`. Deleting an absent id succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db.run(move |store| store.delete_image(&id)).await?;
        Ok(())
    }

    /// Every stored image
    pub async fn list_all(&self) -> Result<Vec<BlobRecord>> {
        self.db.run(|store| store.all_images()).await
    }

    /// Stored images of one kind
    pub async fn list_by_kind(&self, kind: &str) -> Result<Vec<BlobRecord>> {
        let kind = kind.to_string();
        self.db.run(move |store| store.images_by_kind(&kind)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.db.run(|store| store.clear_images()).await
    }

    /// Used bytes against the configured quota; `None` without a quota
    pub async fn estimate_usage(&self) -> Result<Option<StorageUsage>> {
        let Some(quota_bytes) = self.quota_bytes else {
            return Ok(None);
        };
        let used_bytes = self.db.run(|store| store.size_bytes()).await?;
        Ok(Some(StorageUsage { used_bytes, quota_bytes }))
    }
}
