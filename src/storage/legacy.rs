//! Legacy flat storage and the allow-list migration policy
//!
//! The older storage mechanism is a flat map of string keys to string values.
//! Some values are plain strings, others are JSON documents serialized into
//! the string. Which is which is decided by an explicit allow-list, never by
//! inspecting the value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde_json::{Map, Value};
use crate::{Error, Result};

/// How a legacy value is decoded when moved into the new store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPolicy {
    /// Stored verbatim as a JSON string
    Raw,
    /// Parsed as a JSON document
    Json,
}

/// Keys the source application kept in legacy storage, with their decode policy
pub const DEFAULT_ALLOW_LIST: &[(&str, MigrationPolicy)] = &[
    ("lockScreenEnabled", MigrationPolicy::Raw),
    ("lockGestureDirection", MigrationPolicy::Raw),
    ("lockPinEnabled", MigrationPolicy::Raw),
    ("lockPin", MigrationPolicy::Raw),
    ("lockPatternEnabled", MigrationPolicy::Raw),
    ("lockPattern", MigrationPolicy::Raw),
    ("lockPasswordType", MigrationPolicy::Raw),
    ("userName", MigrationPolicy::Raw),
    ("userSignature", MigrationPolicy::Raw),
    ("notebookText", MigrationPolicy::Raw),
    ("playMode", MigrationPolicy::Raw),
    ("daysCounterStart", MigrationPolicy::Raw),
    ("personas", MigrationPolicy::Json),
    ("worldBooks", MigrationPolicy::Json),
    ("chatCharacters", MigrationPolicy::Json),
    ("musicPlaylist", MigrationPolicy::Json),
    ("apiPresets", MigrationPolicy::Json),
    ("widgetLayout", MigrationPolicy::Json),
];

/// Explicit mapping from legacy key to decode policy
#[derive(Debug, Clone)]
pub struct AllowList {
    policies: HashMap<String, MigrationPolicy>,
}

impl AllowList {
    /// An empty allow-list; nothing migrates until keys are added
    pub fn empty() -> Self {
        Self { policies: HashMap::new() }
    }

    /// Add (or replace) the policy for a key
    pub fn with(mut self, key: impl Into<String>, policy: MigrationPolicy) -> Self {
        self.policies.insert(key.into(), policy);
        self
    }

    /// Policy for a key, `None` when the key is not allow-listed
    pub fn policy(&self, key: &str) -> Option<MigrationPolicy> {
        self.policies.get(key).copied()
    }

    /// All allow-listed keys in lexical order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.policies.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for AllowList {
    fn default() -> Self {
        DEFAULT_ALLOW_LIST
            .iter()
            .fold(Self::empty(), |list, (key, policy)| list.with(*key, *policy))
    }
}

/// Decode one legacy value according to its policy
pub fn decode(key: &str, raw: &str, policy: MigrationPolicy) -> Result<Value> {
    match policy {
        MigrationPolicy::Raw => Ok(Value::String(raw.to_string())),
        MigrationPolicy::Json => serde_json::from_str(raw).map_err(|e| Error::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// The older flat string-keyed storage mechanism
pub trait LegacyStorage: Send + Sync {
    /// Read a value; `None` when absent
    fn get_item(&self, key: &str) -> Option<String>;

    /// All keys present
    fn keys(&self) -> Vec<String>;
}

/// Legacy storage held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLegacyStorage {
    items: HashMap<String, String>,
}

impl MemoryLegacyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }
}

impl LegacyStorage for MemoryLegacyStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.items.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Legacy storage dumped to a JSON object file (`{"key": "value", ...}`)
#[derive(Debug, Clone)]
pub struct JsonFileLegacyStorage {
    path: PathBuf,
    items: MemoryLegacyStorage,
}

impl JsonFileLegacyStorage {
    /// Load the dump. A missing file is an empty store; a file that is not a
    /// JSON object is reported as [`Error::Corrupt`]. Booleans and numbers
    /// are kept in their string form; null, array and object values are
    /// skipped one by one.
    pub fn load(path: &Path) -> Result<Self> {
        let mut items = MemoryLegacyStorage::new();

        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let map: Map<String, Value> =
                serde_json::from_str(&contents).map_err(|e| Error::Corrupt {
                    key: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            for (key, value) in map {
                match value {
                    Value::String(text) => items.set_item(key, text),
                    Value::Bool(_) | Value::Number(_) => items.set_item(key, value.to_string()),
                    other => tracing::warn!(
                        "Skipping legacy key {}: expected a string, found {}",
                        key,
                        json_kind(&other)
                    ),
                }
            }
        } else {
            tracing::debug!("No legacy storage at {}", path.display());
        }

        Ok(Self { path: path.to_path_buf(), items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl LegacyStorage for JsonFileLegacyStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get_item(key)
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_raw_keeps_string() {
        let value = decode("daysCounterStart", "42", MigrationPolicy::Raw).unwrap();
        assert_eq!(value, json!("42"));
    }

    #[test]
    fn test_decode_json_parses() {
        let value = decode("personas", r#"[{"name":"A"}]"#, MigrationPolicy::Json).unwrap();
        assert_eq!(value, json!([{"name": "A"}]));
    }

    #[test]
    fn test_decode_json_malformed() {
        let err = decode("personas", "[{", MigrationPolicy::Json).unwrap_err();
        assert!(matches!(err, Error::Corrupt { ref key, .. } if key == "personas"));
    }

    #[test]
    fn test_default_allow_list() {
        let list = AllowList::default();
        assert_eq!(list.policy("lockPin"), Some(MigrationPolicy::Raw));
        assert_eq!(list.policy("personas"), Some(MigrationPolicy::Json));
        assert_eq!(list.policy("somethingElse"), None);
        assert_eq!(list.keys().len(), DEFAULT_ALLOW_LIST.len());
    }

    #[test]
    fn test_json_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, r#"{"userName": "Mika", "personas": "[]"}"#).unwrap();

        let legacy = JsonFileLegacyStorage::load(&path).unwrap();
        assert_eq!(legacy.get_item("userName").as_deref(), Some("Mika"));
        assert_eq!(legacy.keys(), vec!["personas".to_string(), "userName".to_string()]);
    }

    #[test]
    fn test_json_file_storage_tolerates_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{"userName": "Ann", "lockScreenEnabled": true, "daysCounterStart": 3, "widgetLayout": {"x": 1}, "userSignature": null}"#,
        )
        .unwrap();

        let legacy = JsonFileLegacyStorage::load(&path).unwrap();
        assert_eq!(legacy.get_item("userName").as_deref(), Some("Ann"));
        assert_eq!(legacy.get_item("lockScreenEnabled").as_deref(), Some("true"));
        assert_eq!(legacy.get_item("daysCounterStart").as_deref(), Some("3"));
        assert_eq!(legacy.get_item("widgetLayout"), None);
        assert_eq!(legacy.get_item("userSignature"), None);
    }

    #[test]
    fn test_json_file_storage_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = JsonFileLegacyStorage::load(&dir.path().join("none.json")).unwrap();
        assert!(legacy.keys().is_empty());
    }

    #[test]
    fn test_json_file_storage_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(JsonFileLegacyStorage::load(&path), Err(Error::Corrupt { .. })));

        std::fs::write(&path, r#"["userName"]"#).unwrap();
        assert!(matches!(JsonFileLegacyStorage::load(&path), Err(Error::Corrupt { .. })));
    }
}
