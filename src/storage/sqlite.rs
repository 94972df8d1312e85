//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, params, OptionalExtension};
use serde_json::Value;
use crate::{Result, Error};
use super::blob::BlobRecord;
use super::kv::Entry;
use super::schema;

/// SQLite-backed storage for settings and images
///
/// This is the synchronous engine underneath [`super::Database`]; the async
/// stores never touch it outside a blocking task.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        schema::migrate(&self.conn)?;
        Ok(())
    }

    // ========== Settings Operations ==========

    /// Insert or replace a settings entry
    pub fn put_setting(&self, key: &str, value: &Value, updated_at: i64) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, json, updated_at],
        )?;
        Ok(())
    }

    /// Get a settings entry by key
    pub fn get_setting(&self, key: &str) -> Result<Option<Entry>> {
        let row: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT key, value, updated_at FROM settings WHERE key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(key, value, updated_at)| Self::decode_entry(key, &value, updated_at))
            .transpose()
    }

    /// Delete a settings entry, returning whether it existed
    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(changed > 0)
    }

    /// All settings keys in lexical order
    pub fn setting_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM settings ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    /// All settings entries in key order. Rows holding malformed JSON are skipped.
    pub fn all_settings(&self) -> Result<Vec<Entry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (key, value, updated_at) in rows {
            match Self::decode_entry(key, &value, updated_at) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping settings row: {}", e),
            }
        }
        Ok(entries)
    }

    /// Delete every settings entry
    pub fn clear_settings(&self) -> Result<()> {
        self.conn.execute("DELETE FROM settings", [])?;
        Ok(())
    }

    fn decode_entry(key: String, value: &str, updated_at: i64) -> Result<Entry> {
        match serde_json::from_str(value) {
            Ok(value) => Ok(Entry { key, value, updated_at }),
            Err(e) => Err(Error::Corrupt { key, reason: e.to_string() }),
        }
    }

    // ========== Image Operations ==========

    /// Insert or replace an image record
    pub fn put_image(&self, record: &BlobRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO images (id, data, kind, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![record.id, record.data, record.kind, record.created_at],
        )?;
        Ok(())
    }

    /// Get an image record by id
    pub fn get_image(&self, id: &str) -> Result<Option<BlobRecord>> {
        self.conn
            .query_row(
                "SELECT id, data, kind, created_at FROM images WHERE id = ?1",
                [id],
                |row| self.row_to_blob(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete an image record, returning whether it existed
    pub fn delete_image(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// All image records, oldest first
    pub fn all_images(&self) -> Result<Vec<BlobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, data, kind, created_at FROM images ORDER BY created_at, id",
        )?;

        let images = stmt
            .query_map([], |row| self.row_to_blob(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(images)
    }

    /// Image records of one kind, oldest first
    pub fn images_by_kind(&self, kind: &str) -> Result<Vec<BlobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, data, kind, created_at FROM images WHERE kind = ?1 ORDER BY created_at, id",
        )?;

        let images = stmt
            .query_map([kind], |row| self.row_to_blob(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(images)
    }

    /// Delete every image record
    pub fn clear_images(&self) -> Result<()> {
        self.conn.execute("DELETE FROM images", [])?;
        Ok(())
    }

    /// Helper to convert a row to a BlobRecord
    fn row_to_blob(&self, row: &rusqlite::Row) -> rusqlite::Result<BlobRecord> {
        Ok(BlobRecord {
            id: row.get(0)?,
            data: row.get(1)?,
            kind: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    // ========== Bulk Operations ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Size of the database in bytes (page_count * page_size)
    pub fn size_bytes(&self) -> Result<u64> {
        let page_count: i64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let settings: i64 = self.conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
        let images: i64 = self.conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(DbStats {
            settings: settings as usize,
            images: images as usize,
            size_bytes: self.size_bytes()?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    pub settings: usize,
    pub images: usize,
    pub size_bytes: u64,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Settings: {}", self.settings)?;
        writeln!(f, "  Images: {}", self.images)?;
        writeln!(f, "  Size: {} bytes", self.size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_blob(id: &str, kind: &str, created_at: i64) -> BlobRecord {
        BlobRecord {
            id: id.to_string(),
            data: "data:image/png;base64,AAAA".to_string(),
            kind: kind.to_string(),
            created_at,
        }
    }

    #[test]
    fn test_setting_crud() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put_setting("theme", &json!({"dark": true}), 10).unwrap();

        let entry = store.get_setting("theme").unwrap().unwrap();
        assert_eq!(entry.value, json!({"dark": true}));
        assert_eq!(entry.updated_at, 10);

        assert!(store.delete_setting("theme").unwrap());
        assert!(!store.delete_setting("theme").unwrap());
        assert!(store.get_setting("theme").unwrap().is_none());
    }

    #[test]
    fn test_setting_last_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put_setting("name", &json!("a"), 1).unwrap();
        store.put_setting("name", &json!("b"), 2).unwrap();

        assert_eq!(store.setting_keys().unwrap(), vec!["name".to_string()]);
        assert_eq!(store.get_setting("name").unwrap().unwrap().value, json!("b"));
    }

    #[test]
    fn test_corrupt_setting_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES ('bad', '{oops', 0)",
                [],
            )
            .unwrap();
        store.put_setting("good", &json!(1), 0).unwrap();

        assert!(matches!(store.get_setting("bad"), Err(Error::Corrupt { .. })));
        let all = store.all_settings().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "good");
    }

    #[test]
    fn test_image_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put_image(&sample_blob("avatar", "avatar", 1)).unwrap();
        let mut replacement = sample_blob("avatar", "avatar", 2);
        replacement.data = "data:image/png;base64,BBBB".to_string();
        store.put_image(&replacement).unwrap();

        let images = store.all_images().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data, "data:image/png;base64,BBBB");
    }

    #[test]
    fn test_images_by_kind() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put_image(&sample_blob("a", "avatar", 1)).unwrap();
        store.put_image(&sample_blob("w", "wallpaper", 2)).unwrap();
        store.put_image(&sample_blob("b", "avatar", 3)).unwrap();

        let avatars = store.images_by_kind("avatar").unwrap();
        let ids: Vec<_> = avatars.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let stats = store.stats().unwrap();
        assert_eq!(stats.images, 3);
        assert!(stats.size_bytes > 0);
    }
}
