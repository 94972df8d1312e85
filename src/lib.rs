//! # Homescreen - phone home screen simulator core
//!
//! The reusable, non-presentational core of a phone home screen simulator.
//!
//! Homescreen provides:
//! - SQLite-backed async key-value store and image (blob) store sharing one handle
//! - Allow-list migration from the older flat string-keyed storage
//! - Adaptive image compression with animated-format pass-through
//! - Lock screen state machine with slide/swipe, PIN and gesture-pattern unlock
//! - Typed persona / world-book / chat-character collections
//! - JSON export, music player state, and music-search / translation clients

pub mod app;
pub mod compress;
pub mod config;
pub mod export;
pub mod library;
pub mod lock;
pub mod player;
pub mod remote;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use app::HomeScreen;
pub use compress::{CompressOptions, Compressed, DataUrl};
pub use config::HomescreenConfig;
pub use lock::{LockConfig, LockScreenController, LockStage, LockState};
pub use storage::{BlobRecord, BlobStore, Database, Entry, KeyValueStore, StorageUsage};

/// Result type alias for Homescreen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Homescreen operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store could not be opened; every storage-backed feature is unavailable.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Corrupt data for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
