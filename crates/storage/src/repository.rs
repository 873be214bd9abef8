use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result of reading a typed value from a key.
///
/// Separates "nothing stored yet" from "stored but unreadable" so callers can
/// decide whether a fallback hides data loss.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    Found(T),
    Empty,
    Corrupt(String),
}

impl<T> Loaded<T> {
    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Loaded::Found(value) => Some(value),
            Loaded::Empty | Loaded::Corrupt(_) => None,
        }
    }

    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Loaded::Corrupt(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loaded<U> {
        match self {
            Loaded::Found(value) => Loaded::Found(f(value)),
            Loaded::Empty => Loaded::Empty,
            Loaded::Corrupt(reason) => Loaded::Corrupt(reason),
        }
    }

    /// The found value, or `fallback()` for both empty and corrupt reads.
    pub fn unwrap_or_else(self, fallback: impl FnOnce() -> T) -> T {
        self.found().unwrap_or_else(fallback)
    }
}

/// String key-value backend the progress store persists into.
///
/// Values are whole JSON documents; every write replaces the previous value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Store several entries. Backends with transactions apply them atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on the first failed write.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Delete several keys. Backends with transactions apply them atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on the first failed delete.
    async fn remove_many(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns `StorageError` only when the backend itself fails; undecodable
/// data is reported as `Loaded::Corrupt`.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Loaded<T>, StorageError> {
    let Some(raw) = store.get(key).await? else {
        debug!(key, "no stored value");
        return Ok(Loaded::Empty);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Loaded::Found(value)),
        Err(err) => {
            warn!(key, error = %err, "stored value could not be decoded");
            Ok(Loaded::Corrupt(err.to_string()))
        }
    }
}

/// Encode `value` as JSON and store it under `key`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails, or the backend's error.
pub async fn store_json<T: Serialize + Sync + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = to_json(value)?;
    store.set(key, &raw).await?;
    debug!(key, bytes = raw.len(), "stored value");
    Ok(())
}

/// Encode a value the way `store_json` does, for batch writes.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Simple in-memory backend for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }

    /// Whether nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for (key, value) in entries {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Holds the backend behind a trait object for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    #[tokio::test]
    async fn round_trips_json_values() {
        let store = InMemoryStore::new();
        store_json(&store, "counter", &Counter { hits: 3 })
            .await
            .unwrap();

        let loaded: Loaded<Counter> = load_json(&store, "counter").await.unwrap();
        assert_eq!(loaded, Loaded::Found(Counter { hits: 3 }));
    }

    #[tokio::test]
    async fn missing_key_is_empty() {
        let store = InMemoryStore::new();
        let loaded: Loaded<Counter> = load_json(&store, "nope").await.unwrap();
        assert_eq!(loaded, Loaded::Empty);
    }

    #[tokio::test]
    async fn garbage_is_reported_as_corrupt() {
        let store = InMemoryStore::new();
        store.set("counter", "{not json").await.unwrap();

        let loaded: Loaded<Counter> = load_json(&store, "counter").await.unwrap();
        assert!(loaded.is_corrupt());
        assert_eq!(loaded.unwrap_or_else(|| Counter { hits: 0 }).hits, 0);
    }

    #[tokio::test]
    async fn batch_writes_and_removes() {
        let store = InMemoryStore::new();
        store
            .set_many(&[("a".into(), "1".into()), ("b".into(), "2".into())])
            .await
            .unwrap();
        assert_eq!(store.len().unwrap(), 2);

        store
            .remove_many(&["a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn loaded_map_preserves_variant() {
        let found: Loaded<u32> = Loaded::Found(2);
        assert_eq!(found.map(|v| v * 2), Loaded::Found(4));
        let corrupt: Loaded<u32> = Loaded::Corrupt("bad".into());
        assert_eq!(corrupt.map(|v| v * 2), Loaded::Corrupt("bad".into()));
    }
}
