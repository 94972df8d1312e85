//! Storage Layer - SQLite-backed persistence
//!
//! System of record is one SQLite file with tables:
//! - settings(key, value, updated_at)  -- key → JSON value
//! - images(id, data, kind, created_at) -- id → data-URL
//!
//! [`Database`] owns the single lazily opened connection; [`KeyValueStore`]
//! and [`BlobStore`] are cheap async views over it. [`legacy`] holds the older
//! flat string storage and the allow-list used to migrate out of it.

pub mod blob;
pub mod database;
pub mod kv;
pub mod legacy;
pub mod schema;
pub mod sqlite;

pub use blob::{BlobRecord, BlobStore, StorageUsage};
pub use database::Database;
pub use kv::{Entry, KeyValueStore};
pub use legacy::{AllowList, JsonFileLegacyStorage, LegacyStorage, MemoryLegacyStorage, MigrationPolicy};
pub use sqlite::{DbStats, SqliteStore};
