//! JSON export of images and flag settings (no import counterpart)

use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::lock::{LOCK_FLAG_KEYS, flag_string};
use crate::storage::{BlobRecord, BlobStore, Entry, KeyValueStore};
use crate::Result;

pub const EXPORT_VERSION: &str = "2.0";

/// Bookkeeping keys such as `__legacyMigrated` carry this prefix
pub const INTERNAL_KEY_PREFIX: &str = "__";

/// The downloadable export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    /// RFC 3339 timestamp of the export
    pub export_time: String,
    pub images: Vec<BlobRecord>,
    pub settings: BTreeMap<String, String>,
}

/// Flat string map of exportable settings.
///
/// Lock flags always go in when stored; other entries only when their value
/// is a string or boolean. Arrays, objects and internal `__` markers stay out.
pub fn flatten_settings(entries: &[Entry]) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter(|entry| !entry.key.starts_with(INTERNAL_KEY_PREFIX))
        .filter_map(|entry| {
            let flat = if LOCK_FLAG_KEYS.contains(&entry.key.as_str()) {
                flag_string(&entry.value)
            } else {
                match &entry.value {
                    Value::String(s) => Some(s.clone()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                }
            };
            flat.map(|value| (entry.key.clone(), value))
        })
        .collect()
}

impl ExportDocument {
    /// Snapshot both stores
    pub async fn build(kv: &KeyValueStore, blobs: &BlobStore) -> Result<Self> {
        let images = blobs.list_all().await?;
        let settings = flatten_settings(&kv.entries().await?);

        tracing::info!("Exporting {} images and {} settings", images.len(), settings.len());

        Ok(Self {
            version: EXPORT_VERSION.to_string(),
            export_time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            images,
            settings,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Wrote export to {}", path.display());
        Ok(())
    }

    /// Default download name, e.g. `homescreen-backup-20260101-120000.json`
    pub fn file_name(&self) -> String {
        let stamp = chrono::DateTime::parse_from_rfc3339(&self.export_time)
            .map(|t| t.format("%Y%m%d-%H%M%S").to_string())
            .unwrap_or_else(|_| "export".to_string());
        format!("homescreen-backup-{}.json", stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_export_blob_and_lock_flag() {
        let db = Arc::new(Database::in_memory());
        let kv = KeyValueStore::new(db.clone());
        let blobs = BlobStore::new(db);

        blobs.put("a", "data:image/png;base64,AAAA", "avatar").await.unwrap();
        kv.set("lockScreenEnabled", json!("true")).await.unwrap();

        let doc = ExportDocument::build(&kv, &blobs).await.unwrap();
        assert_eq!(doc.version, "2.0");
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].id, "a");
        assert_eq!(doc.images[0].data, "data:image/png;base64,AAAA");
        assert_eq!(doc.images[0].kind, "avatar");

        let parsed: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed["settings"]["lockScreenEnabled"], json!("true"));
        assert_eq!(parsed["images"][0]["kind"], json!("avatar"));
        assert!(parsed["images"][0]["createdAt"].is_i64());
        assert!(chrono::DateTime::parse_from_rfc3339(parsed["exportTime"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_flatten_skips_structured_values() {
        let entry = |key: &str, value: Value| Entry {
            key: key.to_string(),
            value,
            updated_at: 0,
        };
        let flat = flatten_settings(&[
            entry("userName", json!("Ann")),
            entry("darkMode", json!(false)),
            entry("lockPinEnabled", json!(true)),
            entry("personas", json!([{"name": "x"}])),
            entry("widgetLayout", json!({"a": 1})),
            entry("volume", json!(3)),
            entry("__legacyMigrated", json!(true)),
        ]);

        assert_eq!(flat.get("userName").map(String::as_str), Some("Ann"));
        assert_eq!(flat.get("darkMode").map(String::as_str), Some("false"));
        assert_eq!(flat.get("lockPinEnabled").map(String::as_str), Some("true"));
        assert!(!flat.contains_key("__legacyMigrated"));
        assert_eq!(flat.len(), 3);
    }

    #[tokio::test]
    async fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let kv = KeyValueStore::new(Arc::new(Database::in_memory()));
        let blobs = BlobStore::new(Arc::new(Database::in_memory()));
        let doc = ExportDocument::build(&kv, &blobs).await.unwrap();

        let path = dir.path().join(doc.file_name());
        doc.write_to(&path).unwrap();

        let back: ExportDocument = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, doc);
        assert!(back.images.is_empty());
    }
}
