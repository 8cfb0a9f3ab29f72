//! Durable JSON-file storage backend.
//!
//! The file holds a single JSON object. Every read goes to disk and every
//! write re-reads, changes one key, and writes the object back, so separate
//! processes sharing the file see each other's keys. Writes go to a temp file
//! that is renamed over the target, so a crash mid-write leaves the previous
//! contents intact.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Key/value store persisted as a JSON object on disk.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// An unreadable JSON body is treated as an empty store; it will be
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let store = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };

        let keys = store.load()?.len();
        debug!(path = %store.path.display(), keys, "Opened file store");

        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Discarding unreadable store file");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        atomic_write_text(&self.path, &content)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        let mut data = self.load()?;
        data.insert(key.to_string(), value.to_string());
        self.flush(&data)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock();
        let mut data = self.load()?;
        if data.remove(key).is_none() {
            return Ok(false);
        }
        self.flush(&data)?;
        Ok(true)
    }
}

fn atomic_write_text(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store.json");
    let tmp_path = dir.join(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path).unwrap();
        store.set("user", "{\"id\":\"u1\"}").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("user").unwrap(),
            Some("{\"id\":\"u1\"}".to_string())
        );
    }

    #[test]
    fn test_file_store_delete_is_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());

        let reopened = FileStore::open(&path).unwrap();
        assert!(!reopened.has("a").unwrap());
        assert_eq!(reopened.get("b").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.get("user").unwrap(), None);
    }

    #[test]
    fn test_file_store_unreadable_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json at all").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("user").unwrap(), None);

        store.set("user", "x").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("user").unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_two_handles_see_each_others_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let watcher = FileStore::open(&path).unwrap();
        let signer = FileStore::open(&path).unwrap();

        signer.set("user", "{\"id\":\"u1\"}").unwrap();
        assert_eq!(
            watcher.get("user").unwrap(),
            Some("{\"id\":\"u1\"}".to_string())
        );

        // A write through one handle keeps keys written through the other.
        watcher.set("guestUser", "{\"id\":\"g1\"}").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.has("user").unwrap());
        assert!(reopened.has("guestUser").unwrap());

        assert!(signer.delete("guestUser").unwrap());
        assert!(!watcher.has("guestUser").unwrap());
        assert!(watcher.has("user").unwrap());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deeply").join("nested").join("cache.json");

        let store = FileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
