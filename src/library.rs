//! Typed record collections: personas, world-book entries, chat characters
//!
//! Each collection is one JSON array stored under a single settings key.
//! Loading validates every record; bad records are dropped and an
//! unreadable array falls back to an empty collection, both with a warning.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use crate::storage::KeyValueStore;
use crate::{Error, Result};

pub const PERSONAS_KEY: &str = "personas";
pub const WORLD_BOOKS_KEY: &str = "worldBooks";
pub const CHAT_CHARACTERS_KEY: &str = "chatCharacters";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A record kept in a single-key collection
pub trait CollectionRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Settings key holding the array
    const KEY: &'static str;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(Error::Validation(format!("{} record without id", Self::KEY)));
        }
        if self.name().trim().is_empty() {
            return Err(Error::Validation(format!("{} record {} has no name", Self::KEY, self.id())));
        }
        Ok(())
    }
}

/// A user persona; at most one is the ID card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub is_id_card: bool,
}

impl Persona {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            avatar: None,
            group: None,
            is_id_card: false,
        }
    }
}

impl CollectionRecord for Persona {
    const KEY: &'static str = PERSONAS_KEY;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldBookEntry {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl WorldBookEntry {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            content: content.into(),
            group: None,
            enabled: true,
        }
    }
}

impl CollectionRecord for WorldBookEntry {
    const KEY: &'static str = WORLD_BOOKS_KEY;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCharacter {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Persona the user speaks as in this chat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl ChatCharacter {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            avatar: None,
            group: None,
            persona_id: None,
            pinned: false,
        }
    }
}

impl CollectionRecord for ChatCharacter {
    const KEY: &'static str = CHAT_CHARACTERS_KEY;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Decode a stored array, dropping records that fail to parse or validate
pub fn decode_collection<T: CollectionRecord>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        tracing::warn!("{} is not an array, starting empty", T::KEY);
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| {
            let record = serde_json::from_value::<T>(item)
                .map_err(Error::from)
                .and_then(|record| record.validate().map(|_| record));
            match record {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Dropping invalid {} record: {}", T::KEY, e);
                    None
                }
            }
        })
        .collect()
}

/// Load a collection; storage errors propagate, bad data yields empty
pub async fn load_collection<T: CollectionRecord>(kv: &KeyValueStore) -> Result<Vec<T>> {
    match kv.get(T::KEY).await {
        Ok(Some(value)) => Ok(decode_collection(value)),
        Ok(None) => Ok(Vec::new()),
        Err(Error::Corrupt { key, reason }) => {
            tracing::warn!("Corrupt collection {}: {}, starting empty", key, reason);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Validate every record, then replace the stored array
pub async fn save_collection<T: CollectionRecord>(kv: &KeyValueStore, records: &[T]) -> Result<()> {
    for record in records {
        record.validate()?;
    }
    kv.set_as(T::KEY, records).await?;
    tracing::debug!("Saved {} {} records", records.len(), T::KEY);
    Ok(())
}

/// In-memory persona list with the single-ID-card rule
#[derive(Debug, Clone, Default)]
pub struct PersonaLibrary {
    personas: Vec<Persona>,
}

impl PersonaLibrary {
    pub fn new(personas: Vec<Persona>) -> Self {
        let mut library = Self::default();
        for persona in personas {
            library.upsert(persona);
        }
        library
    }

    pub async fn load(kv: &KeyValueStore) -> Result<Self> {
        Ok(Self::new(load_collection(kv).await?))
    }

    pub async fn persist(&self, kv: &KeyValueStore) -> Result<()> {
        save_collection(kv, &self.personas).await
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Insert or replace by id. An ID-card persona takes the flag from all others.
    pub fn save(&mut self, persona: Persona) -> Result<()> {
        persona.validate()?;
        self.upsert(persona);
        Ok(())
    }

    fn upsert(&mut self, persona: Persona) {
        if persona.is_id_card {
            for other in self.personas.iter_mut().filter(|p| p.id != persona.id) {
                other.is_id_card = false;
            }
        }
        match self.personas.iter_mut().find(|p| p.id == persona.id) {
            Some(slot) => *slot = persona,
            None => self.personas.push(persona),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Persona> {
        let index = self.personas.iter().position(|p| p.id == id)?;
        Some(self.personas.remove(index))
    }

    /// The persona currently marked as ID card
    pub fn id_card(&self) -> Option<&Persona> {
        self.personas.iter().find(|p| p.is_id_card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use serde_json::json;
    use std::sync::Arc;

    fn kv() -> KeyValueStore {
        KeyValueStore::new(Arc::new(Database::in_memory()))
    }

    #[test]
    fn test_id_card_is_exclusive() {
        let mut library = PersonaLibrary::default();
        let mut alice = Persona::new("Alice", "first");
        alice.is_id_card = true;
        let mut bob = Persona::new("Bob", "second");
        bob.is_id_card = true;

        library.save(alice.clone()).unwrap();
        library.save(bob.clone()).unwrap();

        let cards: Vec<_> = library.personas().iter().filter(|p| p.is_id_card).collect();
        assert_eq!(cards.len(), 1);
        assert_eq!(library.id_card().map(|p| p.id.as_str()), Some(bob.id.as_str()));
        assert_eq!(library.get(&alice.id).map(|p| p.is_id_card), Some(false));
    }

    #[test]
    fn test_save_upserts_by_id() {
        let mut library = PersonaLibrary::default();
        let mut persona = Persona::new("Alice", "");
        library.save(persona.clone()).unwrap();
        persona.description = "updated".into();
        library.save(persona.clone()).unwrap();

        assert_eq!(library.personas().len(), 1);
        assert_eq!(library.personas()[0].description, "updated");
        assert!(library.remove(&persona.id).is_some());
        assert!(library.remove(&persona.id).is_none());
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut library = PersonaLibrary::default();
        assert!(matches!(library.save(Persona::new("  ", "x")), Err(Error::Validation(_))));
    }

    #[test]
    fn test_decode_drops_bad_records_and_assigns_ids() {
        let value = json!([
            {"name": "Alice", "isIdCard": true},
            {"name": ""},
            {"description": "no name"},
            42
        ]);
        let personas: Vec<Persona> = decode_collection(value);
        assert_eq!(personas.len(), 1);
        assert!(Uuid::parse_str(&personas[0].id).is_ok());
        assert!(personas[0].is_id_card);

        let not_array: Vec<Persona> = decode_collection(json!({"name": "x"}));
        assert!(not_array.is_empty());
    }

    #[tokio::test]
    async fn test_collection_roundtrip() {
        let kv = kv();
        let mut entry = WorldBookEntry::new("Lore", "The city floats.");
        entry.group = Some("setting".into());
        save_collection(&kv, &[entry.clone()]).await.unwrap();

        let loaded: Vec<WorldBookEntry> = load_collection(&kv).await.unwrap();
        assert_eq!(loaded, vec![entry]);

        let stored = kv.get(WORLD_BOOKS_KEY).await.unwrap().unwrap();
        assert_eq!(stored[0]["enabled"], json!(true));
    }

    #[tokio::test]
    async fn test_malformed_collection_loads_empty() {
        let kv = kv();
        kv.set(CHAT_CHARACTERS_KEY, json!("not a list")).await.unwrap();

        let loaded: Vec<ChatCharacter> = load_collection(&kv).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_library_persists() {
        let kv = kv();
        let mut library = PersonaLibrary::default();
        let mut persona = Persona::new("Alice", "");
        persona.is_id_card = true;
        library.save(persona).unwrap();
        library.persist(&kv).await.unwrap();

        let reloaded = PersonaLibrary::load(&kv).await.unwrap();
        assert_eq!(reloaded.id_card().map(|p| p.name.as_str()), Some("Alice"));
    }
}
