//! Async key-value store (the `settings` partition)

use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::{Error, Result};
use super::database::Database;
use super::legacy::{self, AllowList, LegacyStorage};

/// One stored key-value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub key: String,
    pub value: Value,
    /// Milliseconds since the Unix epoch of the last write
    pub updated_at: i64,
}

/// Async key → JSON value store
///
/// Every operation waits for the shared [`Database`] to open, so callers may
/// use the store before (or without) calling [`KeyValueStore::init`].
#[derive(Clone)]
pub struct KeyValueStore {
    db: Arc<Database>,
}

impl KeyValueStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open the underlying store. Idempotent.
    pub async fn init(&self) -> Result<()> {
        self.db.init().await
    }

    /// Value for `key`, `None` when absent
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entry(key).await?.map(|entry| entry.value))
    }

    /// Full entry (with write timestamp) for `key`
    pub async fn entry(&self, key: &str) -> Result<Option<Entry>> {
        let key = key.to_string();
        self.db.run(move |store| store.get_setting(&key)).await
    }

    /// Value for `key` deserialized into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`, replacing any previous value
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        let now = chrono::Utc::now().timestamp_millis();
        self.db
            .run(move |store| store.put_setting(&key, &value, now))
            .await
    }

    /// Serialize `value` and store it under `key`
    pub async fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }

    /// Apply several writes as one transaction; a `None` value removes the key.
    /// Either every change lands or none does.
    pub async fn apply(&self, changes: Vec<(String, Option<Value>)>) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.db
            .run(move |store| {
                store.begin_transaction()?;
                let written = changes.iter().try_for_each(|(key, value)| match value {
                    Some(value) => store.put_setting(key, value, now),
                    None => store.delete_setting(key).map(|_| ()),
                });
                match written {
                    Ok(()) => store.commit(),
                    Err(e) => {
                        store.rollback()?;
                        Err(e)
                    }
                }
            })
            .await
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        let existed = self.db.run(move |store| store.delete_setting(&key)).await?;
        if !existed {
            tracing::debug!("remove: key was not present");
        }
        Ok(())
    }

    /// All keys in lexical order
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        self.db.run(|store| store.setting_keys()).await
    }

    /// All entries in key order
    pub async fn entries(&self) -> Result<Vec<Entry>> {
        self.db.run(|store| store.all_settings()).await
    }

    /// Delete every key
    pub async fn clear(&self) -> Result<()> {
        self.db.run(|store| store.clear_settings()).await
    }

    /// Move `keys` from legacy storage into this store.
    ///
    /// Each key is decoded with its allow-list policy. Keys that are not
    /// allow-listed, absent from legacy storage, fail to decode, or fail to
    /// write are logged and skipped. Returns the number of keys written.
    /// Only a store-open failure aborts the batch.
    pub async fn migrate_legacy<S: AsRef<str>>(
        &self,
        source: &dyn LegacyStorage,
        allow: &AllowList,
        keys: &[S],
    ) -> Result<usize> {
        self.init().await?;

        let mut migrated = 0;
        for key in keys {
            let key = key.as_ref();

            let Some(policy) = allow.policy(key) else {
                tracing::warn!("Legacy key {} is not allow-listed, skipping", key);
                continue;
            };

            let Some(raw) = source.get_item(key) else {
                tracing::debug!("Legacy key {} not present", key);
                continue;
            };

            let value = match legacy::decode(key, &raw, policy) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping legacy key {}: {}", key, e);
                    continue;
                }
            };

            match self.set(key, value).await {
                Ok(()) => migrated += 1,
                Err(e) => tracing::error!("Failed to migrate legacy key {}: {}", key, e),
            }
        }

        tracing::info!("Migrated {} of {} legacy keys", migrated, keys.len());
        Ok(migrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::legacy::{MemoryLegacyStorage, MigrationPolicy};
    use serde_json::json;

    fn store() -> KeyValueStore {
        KeyValueStore::new(Arc::new(Database::in_memory()))
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let kv = store();
        let values = [
            json!("text"),
            json!(42),
            json!(true),
            json!(null),
            json!([1, "two", {"three": 3}]),
            json!({"nested": {"list": [1, 2, 3], "flag": false}}),
        ];

        for (i, value) in values.iter().enumerate() {
            let key = format!("key{}", i);
            kv.set(&key, value.clone()).await.unwrap();
            assert_eq!(kv.get(&key).await.unwrap().as_ref(), Some(value));
        }
    }

    #[tokio::test]
    async fn test_usable_before_init() {
        let kv = store();
        // No init() call first
        kv.set("a", json!(1)).await.unwrap();
        kv.init().await.unwrap();
        kv.init().await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_apply_writes_and_removes() {
        let kv = store();
        kv.set("old", json!("x")).await.unwrap();
        kv.apply(vec![
            ("a".to_string(), Some(json!("1"))),
            ("b".to_string(), Some(json!([2]))),
            ("old".to_string(), None),
        ])
        .await
        .unwrap();

        assert_eq!(kv.list_keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(kv.get("b").await.unwrap(), Some(json!([2])));
    }

    #[tokio::test]
    async fn test_remove_then_get_is_none() {
        let kv = store();
        kv.set("gone", json!("soon")).await.unwrap();
        kv.remove("gone").await.unwrap();
        assert_eq!(kv.get("gone").await.unwrap(), None);

        // Removing again is not an error
        kv.remove("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys_and_clear() {
        let kv = store();
        kv.set("b", json!(2)).await.unwrap();
        kv.set("a", json!(1)).await.unwrap();

        assert_eq!(kv.list_keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);

        kv.clear().await.unwrap();
        assert!(kv.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Preset {
            name: String,
            volume: u8,
        }

        let kv = store();
        let preset = Preset { name: "night".to_string(), volume: 3 };
        kv.set_as("preset", &preset).await.unwrap();
        assert_eq!(kv.get_as::<Preset>("preset").await.unwrap(), Some(preset));

        kv.set("preset", json!("not a preset")).await.unwrap();
        assert!(matches!(kv.get_as::<Preset>("preset").await, Err(Error::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_entry_has_timestamp() {
        let kv = store();
        let before = chrono::Utc::now().timestamp_millis();
        kv.set("k", json!(1)).await.unwrap();

        let entry = kv.entry("k").await.unwrap().unwrap();
        assert!(entry.updated_at >= before);
    }

    #[tokio::test]
    async fn test_migrate_legacy_policies() {
        let kv = store();
        let mut legacy = MemoryLegacyStorage::new();
        legacy.set_item("counter", "42");
        legacy.set_item("items", r#"{"a": [1, 2]}"#);
        legacy.set_item("broken", "{nope");
        legacy.set_item("unlisted", "x");

        let allow = AllowList::empty()
            .with("counter", MigrationPolicy::Raw)
            .with("items", MigrationPolicy::Json)
            .with("broken", MigrationPolicy::Json)
            .with("missing", MigrationPolicy::Raw);

        let count = kv
            .migrate_legacy(&legacy, &allow, &["counter", "items", "broken", "unlisted", "missing"])
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(kv.get("counter").await.unwrap(), Some(json!("42")));
        assert_ne!(kv.get("counter").await.unwrap(), Some(json!(42)));
        assert_eq!(kv.get("items").await.unwrap(), Some(json!({"a": [1, 2]})));
        assert_eq!(kv.get("broken").await.unwrap(), None);
        assert_eq!(kv.get("unlisted").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migrate_legacy_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let kv = KeyValueStore::new(Arc::new(Database::new(dir.path())));
        let legacy = MemoryLegacyStorage::new();

        let result = kv
            .migrate_legacy(&legacy, &AllowList::default(), &["userName"])
            .await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }
}
