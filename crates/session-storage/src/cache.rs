//! High-level API over the durable local cache.

use crate::{KeyValueStore, StorageError, StorageKeys, StorageResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persisted guest-mode record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    /// Locally generated guest identifier
    pub id: String,
    /// Always true when present
    #[serde(rename = "isGuest")]
    pub is_guest: bool,
}

impl GuestRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_guest: true,
        }
    }
}

/// Durable cache of the last-known user and the guest flag.
///
/// Corrupt records are discarded on read and reported as absent.
pub struct LocalCache {
    storage: Box<dyn KeyValueStore>,
}

impl LocalCache {
    /// Create a new cache over the given storage backend
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Cached user
    // ==========================================

    /// Read the cached user record.
    pub fn user<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        self.read_json(StorageKeys::USER)
    }

    /// Overwrite the cached user record.
    pub fn set_user<T: Serialize>(&self, user: &T) -> StorageResult<()> {
        let json =
            serde_json::to_string(user).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER, &json)
    }

    /// Remove the cached user record.
    pub fn clear_user(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::USER)
    }

    /// Cheap presence check that does not parse the record.
    pub fn has_user(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::USER)
    }

    // ==========================================
    // Guest flag
    // ==========================================

    /// Read the guest record, if guest mode is active.
    pub fn guest(&self) -> StorageResult<Option<GuestRecord>> {
        let record: Option<GuestRecord> = self.read_json(StorageKeys::GUEST_USER)?;
        match record {
            Some(record) if !record.is_guest => {
                warn!(id = %record.id, "Guest record without isGuest flag, discarding");
                self.storage.delete(StorageKeys::GUEST_USER)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Persist the guest record.
    pub fn set_guest(&self, record: &GuestRecord) -> StorageResult<()> {
        let json =
            serde_json::to_string(record).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::GUEST_USER, &json)
    }

    /// Remove the guest record.
    pub fn clear_guest(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::GUEST_USER)
    }

    /// True if either a user or a guest record is present.
    pub fn has_any(&self) -> StorageResult<bool> {
        Ok(self.storage.has(StorageKeys::USER)? || self.storage.has(StorageKeys::GUEST_USER)?)
    }

    /// Remove everything the cache owns.
    pub fn clear_all(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::USER)?;
        self.storage.delete(StorageKeys::GUEST_USER)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let corrupt = StorageError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %corrupt, "Discarding corrupt cache record");
                self.storage.delete(key)?;
                debug!(key = %key, "Corrupt record removed");
                Ok(None)
            }
        }
    }
}
