//! Storage abstraction used by the app.
//!
//! This module provides a single trait `StorageBackend` and two concrete
//! implementations:
//!
//! - `FileStorage` stores a single JSON file containing a map of string keys
//!   to string values, in a per-user configuration directory by default.
//!   Every mutation rewrites the file through a temporary sibling and a rename.
//! - `MemoryStorage` keeps everything in memory (`--ignore-persisted`, tests).
//!
//! On top of the backend, `PersistedFavorites` implements the favorites store
//! used by the pipeline.

use geogas_lib::{Favorites, FavoritesQuery, FavoritesSet};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Key holding the favorite station ids
pub const FAVORITES_KEY: &str = "favorites";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Platform storage error: {0}")]
    Platform(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Simple generic storage backend trait.
///
/// Keys and values are UTF-8 strings. Structured data goes through the
/// `save_json_backend` / `load_json_backend` helpers.
pub trait StorageBackend: Send + Sync {
    /// Store a string value for a key.
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read a string value for a key. Returns Ok(None) when key is missing.
    fn get_string(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove a key (no-op if key does not exist).
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All stored keys, in no particular order.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

pub fn save_json_backend<T: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    match serde_json::to_string(value) {
        Ok(s) => backend.set_string(key, &s),
        Err(e) => Err(StorageError::Json(e.to_string())),
    }
}

pub fn load_json_backend<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> StorageResult<Option<T>> {
    match backend.get_string(key)? {
        Some(s) => match serde_json::from_str::<T>(&s) {
            Ok(v) => Ok(Some(v)),
            Err(e) => Err(StorageError::Json(e.to_string())),
        },
        None => Ok(None),
    }
}

fn lock_poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Platform(format!("mutex poisoned: {e}"))
}

//
// In-memory implementation
//

/// Volatile storage, forgotten when dropped.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().map_err(lock_poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.inner.lock().map_err(lock_poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().map_err(lock_poisoned)?;
        guard.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let guard = self.inner.lock().map_err(lock_poisoned)?;
        Ok(guard.keys().cloned().collect())
    }
}

//
// File-backed implementation
//

/// File-based storage: a single JSON file which is a map of key -> string value.
///
/// - On init, the file is read into memory.
/// - Mutations update memory and flush the whole map back to disk.
pub struct FileStorage {
    /// Path to the backing JSON file.
    path: PathBuf,
    /// In-memory copy of key -> value
    inner: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Determine a good default storage file path for the current user.
    ///
    /// - On Windows: %APPDATA%/GeoGas/storage.json
    /// - Else: $HOME/.config/geogas/storage.json
    pub fn default_storage_path() -> PathBuf {
        if cfg!(windows)
            && let Ok(appdata) = std::env::var("APPDATA")
        {
            return Path::new(&appdata).join("GeoGas").join("storage.json");
        }

        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home)
                .join(".config")
                .join("geogas")
                .join("storage.json");
        }

        // Fallback to current directory
        Path::new(".").join("geogas-storage.json")
    }

    pub fn new_with_path(path: Option<PathBuf>) -> StorageResult<Self> {
        let path = path.unwrap_or_else(Self::default_storage_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create storage parent directory: {e}"))
            })?;
        }

        let mut map: HashMap<String, String> = HashMap::new();
        if path.exists() {
            let s = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read storage file: {e}")))?;
            if !s.trim().is_empty() {
                map = serde_json::from_str(&s).map_err(|e| {
                    StorageError::Json(format!("Failed to parse storage JSON: {e}"))
                })?;
            }
        }

        tracing::debug!(path = %path.display(), keys = map.len(), "Opened file storage");
        Ok(FileStorage {
            path,
            inner: Mutex::new(map),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the map next to the target, then rename over it
    fn flush_locked(&self, locked: &HashMap<String, String>) -> StorageResult<()> {
        let s = serde_json::to_string_pretty(locked).map_err(|e| StorageError::Json(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, s).map_err(|e| StorageError::Io(format!("write failed: {e}")))?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::Io(format!("rename failed: {e}")))
    }
}

impl StorageBackend for FileStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().map_err(lock_poisoned)?;
        let previous = guard.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush_locked(&guard) {
            // Keep memory and disk in agreement
            match previous {
                Some(previous) => guard.insert(key.to_string(), previous),
                None => guard.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self.inner.lock().map_err(lock_poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().map_err(lock_poisoned)?;
        let Some(previous) = guard.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush_locked(&guard) {
            guard.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let guard = self.inner.lock().map_err(lock_poisoned)?;
        Ok(guard.keys().cloned().collect())
    }
}

//
// Favorites on top of a backend
//

/// Favorites store persisted under [`FAVORITES_KEY`]
///
/// Membership queries are answered from memory. A mutation is applied in
/// memory only once the backend accepted it.
pub struct PersistedFavorites {
    backend: Box<dyn StorageBackend>,
    ids: FavoritesSet,
}

impl PersistedFavorites {
    /// Load the favorites stored in `backend`
    ///
    /// A missing key yields an empty set; an unreadable value is an error.
    pub fn load(backend: Box<dyn StorageBackend>) -> StorageResult<Self> {
        let ids: BTreeSet<String> = load_json_backend(backend.as_ref(), FAVORITES_KEY)?.unwrap_or_default();
        tracing::info!(count = ids.len(), "Favorites loaded");
        Ok(Self {
            backend,
            ids: ids.into_iter().collect(),
        })
    }

    /// Volatile favorites, nothing is persisted
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryStorage::new()),
            ids: FavoritesSet::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FavoritesQuery for PersistedFavorites {
    #[inline]
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }
}

impl Favorites for PersistedFavorites {
    type Error = StorageError;

    fn toggle(&mut self, id: &str) -> StorageResult<bool> {
        let mut next = self.ids.clone();
        let Ok(now_favorite) = next.toggle(id);
        save_json_backend(self.backend.as_ref(), FAVORITES_KEY, &next.all())?;
        self.ids = next;
        tracing::debug!(id, now_favorite, "Favorite toggled");
        Ok(now_favorite)
    }

    fn all(&self) -> BTreeSet<String> {
        self.ids.all()
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.backend.remove(FAVORITES_KEY)?;
        self.ids = FavoritesSet::new();
        Ok(())
    }
}
