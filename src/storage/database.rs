//! Shared, lazily opened storage handle
//!
//! Both [`super::KeyValueStore`] and [`super::BlobStore`] run on one
//! `Database`. The connection is opened on first use; callers that arrive
//! while the open is in flight wait for it instead of opening their own.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use crate::{Error, Result};
use super::sqlite::SqliteStore;

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Async handle to the SQLite store
pub struct Database {
    location: Location,
    store: OnceCell<Arc<Mutex<SqliteStore>>>,
}

impl Database {
    /// A database backed by a file. Nothing is opened until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            store: OnceCell::new(),
        }
    }

    /// A private in-memory database (for testing)
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            store: OnceCell::new(),
        }
    }

    /// Open the store if it is not open yet.
    ///
    /// Safe to call any number of times, concurrently. A failure here means
    /// the whole store is unavailable and is reported as
    /// [`Error::StorageUnavailable`]; the next call retries the open.
    pub async fn init(&self) -> Result<()> {
        self.handle().await.map(|_| ())
    }

    /// Whether the store has been opened successfully
    pub fn is_open(&self) -> bool {
        self.store.initialized()
    }

    async fn handle(&self) -> Result<Arc<Mutex<SqliteStore>>> {
        let store = self
            .store
            .get_or_try_init(|| async {
                let location = self.location.clone();
                let opened = tokio::task::spawn_blocking(move || open_location(&location)).await;
                match opened {
                    Ok(Ok(store)) => {
                        tracing::info!("Opened store ({:?})", self.location);
                        Ok(Arc::new(Mutex::new(store)))
                    }
                    Ok(Err(e)) => {
                        tracing::error!("Failed to open store {:?}: {}", self.location, e);
                        Err(Error::StorageUnavailable(e.to_string()))
                    }
                    Err(e) => Err(Error::StorageUnavailable(e.to_string())),
                }
            })
            .await?;
        Ok(Arc::clone(store))
    }

    /// Run `f` against the store on the blocking thread pool, opening it first if needed.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.handle().await?;
        tokio::task::spawn_blocking(move || {
            let mut store = handle
                .lock()
                .map_err(|_| Error::StorageUnavailable("store lock poisoned".to_string()))?;
            f(&mut *store)
        })
        .await?
    }
}

fn open_location(location: &Location) -> Result<SqliteStore> {
    match location {
        Location::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteStore::open(path)
        }
        Location::Memory => SqliteStore::open_in_memory(),
    }
}
