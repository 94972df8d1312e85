//! Application state: stores, lock screen and the startup sequence
//!
//! Startup opens the database, runs the one-time legacy migration, then
//! loads the lock configuration. If the database cannot be opened the app
//! still comes up, without storage and without a lock screen.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde_json::Value;
use crate::compress::{self, DataUrl, JpegCodec};
use crate::config::HomescreenConfig;
use crate::export::ExportDocument;
use crate::library::PersonaLibrary;
use crate::lock::{LockConfig, LockScreenController};
use crate::player::Player;
use crate::storage::{AllowList, BlobRecord, BlobStore, Database, JsonFileLegacyStorage, KeyValueStore};
use crate::{Error, Result};

/// Set once the legacy storage has been migrated
pub const LEGACY_MIGRATED_KEY: &str = "__legacyMigrated";

/// Uploads larger than this are rejected before compression
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// The two views over the shared database
#[derive(Clone)]
pub struct Stores {
    pub db: Arc<Database>,
    pub kv: KeyValueStore,
    pub blobs: BlobStore,
}

impl Stores {
    pub fn open(path: impl Into<PathBuf>, quota_bytes: Option<u64>) -> Self {
        Self::over(Arc::new(Database::new(path)), quota_bytes)
    }

    pub fn in_memory() -> Self {
        Self::over(Arc::new(Database::in_memory()), None)
    }

    fn over(db: Arc<Database>, quota_bytes: Option<u64>) -> Self {
        Self {
            kv: KeyValueStore::new(db.clone()),
            blobs: BlobStore::new(db.clone()).with_quota(quota_bytes),
            db,
        }
    }
}

pub struct HomeScreen {
    config: HomescreenConfig,
    stores: Option<Stores>,
    lock: LockScreenController,
}

impl HomeScreen {
    /// Start against the configured database file
    pub async fn boot(config: HomescreenConfig) -> Self {
        let stores = Stores::open(&config.storage.database, config.storage.quota_bytes);
        Self::boot_with(config, stores).await
    }

    /// Start against already constructed stores. Never fails: an unusable
    /// store degrades to no storage and an unlocked session.
    pub async fn boot_with(config: HomescreenConfig, stores: Stores) -> Self {
        if let Err(e) = stores.kv.init().await {
            tracing::error!("Storage unavailable, continuing without it: {}", e);
            return Self {
                config,
                stores: None,
                lock: LockScreenController::unlocked(),
            };
        }

        if let Some(legacy) = &config.storage.legacy_path {
            if let Err(e) = migrate_legacy_once(&stores.kv, Path::new(legacy)).await {
                tracing::warn!("Legacy migration skipped: {}", e);
            }
        }

        let lock_config = LockConfig::load(&stores.kv).await.unwrap_or_else(|e| {
            tracing::warn!("Could not read lock settings, lock screen off: {}", e);
            LockConfig::default()
        });
        let lock = LockScreenController::new(&lock_config, &config.lock);

        Self {
            config,
            stores: Some(stores),
            lock,
        }
    }

    pub fn config(&self) -> &HomescreenConfig {
        &self.config
    }

    /// Whether storage came up
    pub fn has_storage(&self) -> bool {
        self.stores.is_some()
    }

    pub fn stores(&self) -> Result<&Stores> {
        self.stores
            .as_ref()
            .ok_or_else(|| Error::StorageUnavailable("store failed to open at startup".to_string()))
    }

    pub fn kv(&self) -> Result<&KeyValueStore> {
        Ok(&self.stores()?.kv)
    }

    pub fn blobs(&self) -> Result<&BlobStore> {
        Ok(&self.stores()?.blobs)
    }

    pub fn lock(&self) -> &LockScreenController {
        &self.lock
    }

    pub async fn personas(&self) -> Result<PersonaLibrary> {
        PersonaLibrary::load(self.kv()?).await
    }

    pub async fn player(&self) -> Result<Player> {
        Player::load(self.kv()?).await
    }

    pub async fn export(&self) -> Result<ExportDocument> {
        let stores = self.stores()?;
        ExportDocument::build(&stores.kv, &stores.blobs).await
    }

    /// Validate, compress and store an uploaded image under `id`
    pub async fn upload_image(&self, id: &str, bytes: Vec<u8>, kind: &str) -> Result<BlobRecord> {
        let blobs = self.blobs()?;
        let data = prepare_image(bytes, &self.config.compression).await?;
        store_image(blobs, id, &data, kind).await
    }
}

/// Validate and compress image bytes into a data-URL, off the async runtime
pub async fn prepare_image(bytes: Vec<u8>, opts: &compress::CompressOptions) -> Result<String> {
    let mime = compress::sniff_mime(&bytes);
    compress::validate_upload(mime, bytes.len(), MAX_UPLOAD_BYTES)?;

    let opts = opts.clone();
    let compressed =
        tokio::task::spawn_blocking(move || compress::compress(&JpegCodec, &bytes, &opts)).await??;

    tracing::info!(
        "Compressed image to {} KB (quality {}, {} attempts{})",
        compressed.bytes.len() / 1024,
        compressed.quality,
        compressed.attempts,
        if compressed.passthrough { ", animated pass-through" } else { "" }
    );
    Ok(compressed.to_data_url())
}

/// Store an image given as raw bytes without compressing it
pub fn raw_data_url(bytes: Vec<u8>) -> Result<String> {
    let mime = compress::sniff_mime(&bytes);
    compress::validate_upload(mime, bytes.len(), MAX_UPLOAD_BYTES)?;
    Ok(DataUrl::new(mime, bytes).to_string())
}

pub async fn store_image(blobs: &BlobStore, id: &str, data: &str, kind: &str) -> Result<BlobRecord> {
    blobs.put(id, data, kind).await?;
    blobs
        .record(id)
        .await?
        .ok_or_else(|| Error::StorageUnavailable(format!("image {} vanished after write", id)))
}

/// Migrate every allow-listed key from the legacy dump unless already done.
/// Returns the number of migrated keys, `None` when skipped.
pub async fn migrate_legacy_once(kv: &KeyValueStore, legacy_path: &Path) -> Result<Option<usize>> {
    if kv.get(LEGACY_MIGRATED_KEY).await?.is_some() {
        tracing::debug!("Legacy storage already migrated");
        return Ok(None);
    }

    let legacy = JsonFileLegacyStorage::load(legacy_path)?;
    let allow = AllowList::default();
    let migrated = kv.migrate_legacy(&legacy, &allow, &allow.keys()).await?;
    kv.set(LEGACY_MIGRATED_KEY, Value::Bool(true)).await?;
    Ok(Some(migrated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockStage, LockState};
    use serde_json::json;

    #[tokio::test]
    async fn test_unavailable_storage_degrades() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file
        let stores = Stores::open(dir.path(), None);
        let app = HomeScreen::boot_with(HomescreenConfig::default(), stores).await;

        assert!(!app.has_storage());
        assert!(app.lock().is_unlocked());
        assert!(matches!(app.kv(), Err(Error::StorageUnavailable(_))));
        assert!(matches!(app.export().await, Err(Error::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_boot_loads_lock_config() {
        let stores = Stores::in_memory();
        let mut lock = LockConfig { enabled: true, ..Default::default() };
        lock.set_pin("1234").unwrap();
        lock.save(&stores.kv).await.unwrap();

        let app = HomeScreen::boot_with(HomescreenConfig::default(), stores).await;
        assert!(app.has_storage());
        assert_eq!(app.lock().state(), LockState::Locked(LockStage::NoAuth));
    }

    #[tokio::test]
    async fn test_legacy_migration_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("legacy.json");
        std::fs::write(
            &legacy,
            json!({
                "lockScreenEnabled": "true",
                "userName": "42",
                "personas": "[{\"name\": \"Ann\"}]",
                "unknownKey": "ignored"
            })
            .to_string(),
        )
        .unwrap();

        let mut config = HomescreenConfig::default();
        config.storage.legacy_path = Some(legacy.to_string_lossy().into_owned());
        let stores = Stores::in_memory();
        let kv = stores.kv.clone();

        let app = HomeScreen::boot_with(config, stores).await;
        assert_eq!(kv.get("userName").await.unwrap(), Some(json!("42")));
        assert_eq!(kv.get("unknownKey").await.unwrap(), None);
        assert_eq!(app.personas().await.unwrap().personas().len(), 1);
        assert_eq!(app.lock().state(), LockState::Locked(LockStage::NoAuth));

        kv.set("userName", json!("changed")).await.unwrap();
        assert_eq!(migrate_legacy_once(&kv, &legacy).await.unwrap(), None);
        assert_eq!(kv.get("userName").await.unwrap(), Some(json!("changed")));
    }

    #[tokio::test]
    async fn test_legacy_migration_survives_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("legacy.json");
        std::fs::write(
            &legacy,
            json!({
                "userName": "Ann",
                "lockScreenEnabled": true,
                "widgetLayout": {"x": 1}
            })
            .to_string(),
        )
        .unwrap();

        let mut config = HomescreenConfig::default();
        config.storage.legacy_path = Some(legacy.to_string_lossy().into_owned());
        let stores = Stores::in_memory();
        let kv = stores.kv.clone();

        let app = HomeScreen::boot_with(config, stores).await;
        assert_eq!(kv.get("userName").await.unwrap(), Some(json!("Ann")));
        assert_eq!(kv.get("lockScreenEnabled").await.unwrap(), Some(json!("true")));
        assert_eq!(kv.get("widgetLayout").await.unwrap(), None);
        assert_eq!(kv.get(LEGACY_MIGRATED_KEY).await.unwrap(), Some(json!(true)));

        let doc = app.export().await.unwrap();
        assert_eq!(doc.settings.get("userName").map(String::as_str), Some("Ann"));
        assert!(!doc.settings.contains_key(LEGACY_MIGRATED_KEY));
    }

    #[tokio::test]
    async fn test_boot_opens_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HomescreenConfig::default();
        config.storage.database = dir.path().join("homescreen.db").to_string_lossy().into_owned();

        let app = HomeScreen::boot(config.clone()).await;
        assert!(app.has_storage());
        app.kv().unwrap().set("userName", json!("Ann")).await.unwrap();
        drop(app);

        let reopened = HomeScreen::boot(config).await;
        assert_eq!(reopened.kv().unwrap().get("userName").await.unwrap(), Some(json!("Ann")));
        assert!(reopened.lock().is_unlocked());
    }

    #[tokio::test]
    async fn test_upload_image() {
        let app = HomeScreen::boot_with(HomescreenConfig::default(), Stores::in_memory()).await;

        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(40, 30)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let record = app.upload_image("wallpaper", png, "wallpaper").await.unwrap();
        assert_eq!(record.kind, "wallpaper");
        let url = DataUrl::parse(&record.data).unwrap();
        assert_eq!(url.mime, "image/jpeg");

        let rejected = app.upload_image("x", b"plain text".to_vec(), "avatar").await;
        assert!(matches!(rejected, Err(Error::Validation(_))));
        assert_eq!(app.blobs().unwrap().get("x").await.unwrap(), None);
    }

    #[test]
    fn test_raw_data_url_keeps_bytes() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let url = raw_data_url(gif.clone()).unwrap();
        assert!(url.starts_with("data:image/gif;base64,"));
        assert_eq!(DataUrl::parse(&url).unwrap().bytes, gif);
    }
}
