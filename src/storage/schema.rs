//! Database schema definitions

use rusqlite::Connection;

/// Current schema version, tracked in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 2;

/// SQL to create the settings table (key-value partition)
pub const CREATE_SETTINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

/// SQL to create the images table (blob partition)
pub const CREATE_IMAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// Indexes added in schema version 2
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_images_kind ON images(kind)",
    "CREATE INDEX IF NOT EXISTS idx_settings_updated ON settings(updated_at)",
];

/// Bring the schema up to [`SCHEMA_VERSION`], one version step at a time.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let mut version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        conn.execute(CREATE_SETTINGS_TABLE, [])?;
        conn.execute(CREATE_IMAGES_TABLE, [])?;
        conn.execute_batch("PRAGMA user_version = 1;")?;
        version = 1;
    }

    if version < 2 {
        for stmt in CREATE_INDEXES {
            conn.execute(stmt, [])?;
        }
        conn.execute_batch("PRAGMA user_version = 2;")?;
        version = 2;
    }

    tracing::debug!("Schema at version {}", version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_sets_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES ('a', '1', 0)",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upgrade_from_version_one() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(CREATE_SETTINGS_TABLE, []).unwrap();
        conn.execute(CREATE_IMAGES_TABLE, []).unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();

        migrate(&conn).unwrap();

        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_images_kind'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);
    }
}
