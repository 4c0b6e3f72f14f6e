//! First-open timestamp persistence.
//!
//! The first profile build of an installation records the current time,
//! and every later snapshot reports that same value. [`first_open_or_init`]
//! enforces the write-once rule on top of any [`FirstOpenStore`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name used by [`FileStore`] inside its data directory.
pub const STATE_FILE: &str = "state.json";

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the state file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The state file is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Durable storage for one integer: the first-open timestamp (ms).
#[async_trait]
pub trait FirstOpenStore: Send + Sync {
    /// Stored timestamp, if any.
    async fn load(&self) -> Result<Option<i64>, StoreError>;

    /// Persist the timestamp.
    async fn save(&self, millis: i64) -> Result<(), StoreError>;
}

/// Return the stored first-open timestamp, recording `now` if there is none.
pub async fn first_open_or_init(
    store: &dyn FirstOpenStore,
    now: i64,
) -> Result<i64, StoreError> {
    if let Some(existing) = store.load().await? {
        return Ok(existing);
    }
    store.save(now).await?;
    tracing::info!(first_open = now, "recorded first open");
    Ok(now)
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<i64>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a timestamp.
    pub fn with_value(millis: i64) -> Self {
        Self {
            value: Mutex::new(Some(millis)),
        }
    }
}

#[async_trait]
impl FirstOpenStore for MemoryStore {
    async fn load(&self) -> Result<Option<i64>, StoreError> {
        Ok(*self.value.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn save(&self, millis: i64) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(millis);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    app_first_open_timestamp: Option<i64>,
}

/// JSON file store (`state.json`, owner read/write only on Unix).
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store inside `data_dir`. The directory is created on first save.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(STATE_FILE),
        }
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_state(&self) -> Result<StoredState, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl FirstOpenStore for FileStore {
    async fn load(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.read_state().await?.app_first_open_timestamp)
    }

    async fn save(&self, millis: i64) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let state = StoredState {
            app_first_open_timestamp: Some(millis),
        };
        let contents = serde_json::to_string_pretty(&state).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| self.io_error(e))?;
        set_file_permissions_0600(&self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn first_open_is_written_once() {
        let store = MemoryStore::new();

        let first = first_open_or_init(&store, 1_000).await.unwrap();
        let second = first_open_or_init(&store, 2_000).await.unwrap();

        assert_eq!(first, 1_000);
        assert_eq!(second, 1_000);
    }

    #[tokio::test]
    async fn preloaded_store_is_kept() {
        let store = MemoryStore::with_value(42);
        assert_eq!(first_open_or_init(&store, 1_000).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(&dir.path().join("nested"));

        store.save(1_700_000_000_000).await.unwrap();

        let reopened = FileStore::new(&dir.path().join("nested"));
        assert_eq!(reopened.load().await.unwrap(), Some(1_700_000_000_000));
        assert_eq!(
            first_open_or_init(&reopened, 1).await.unwrap(),
            1_700_000_000_000
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.save(1).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn file_store_rejects_garbage() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), "not json").unwrap();

        let store = FileStore::new(dir.path());
        assert!(matches!(store.load().await, Err(StoreError::Parse { .. })));
    }
}
