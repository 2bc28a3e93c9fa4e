//! Key-value persistence.
//!
//! Values are JSON strings under flat string keys. `FileStore` keeps one file per
//! key inside a directory; `MemoryStore` backs tests and dry runs.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DataError, DataResult};
use kopilka_core::EntityId;

pub const KEY_CURRENT_USER: &str = "currentUser";
pub const KEY_USERS: &str = "users";
pub const KEY_LOGIN_ATTEMPTS: &str = "loginAttempts";
pub const KEY_SECURITY_LOGS: &str = "securityLogs";
pub const KEY_APP_LOGS: &str = "financeAppLogs";
pub const KEY_THEME: &str = "theme";
pub const KEY_LAST_SYNC: &str = "lastSyncTime";
pub const KEY_SYNC_QUEUE: &str = "syncQueue";

pub fn user_data_key(user_id: &EntityId) -> String {
    format!("user_{user_id}")
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> DataResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> DataResult<()>;
    fn remove(&mut self, key: &str) -> DataResult<()>;
    fn keys(&self) -> DataResult<Vec<String>>;
}

/// Read and decode a JSON value. Missing keys, unreadable storage and corrupt
/// JSON all come back as `None`; the last two are logged.
pub fn read_json<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::error!("reading {key}: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("corrupt JSON under {key}: {e}");
            None
        }
    }
}

pub fn write_json<T: Serialize + ?Sized>(store: &mut impl KeyValueStore, key: &str, value: &T) -> DataResult<()> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json)
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    /// When set, every write fails with a storage error
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes, like a full disk.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> DataResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> DataResult<()> {
        if self.read_only {
            return Err(DataError::Storage(format!("store is read-only, cannot write {key}")));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> DataResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> DataResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> DataResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> DataResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
            && !key.starts_with('.');
        if !valid {
            return Err(DataError::Storage(format!("invalid key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> DataResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DataError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> DataResult<()> {
        let path = self.path_for(key)?;
        // Write-then-rename so a crash never leaves half a file behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| DataError::Storage(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| DataError::Storage(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> DataResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DataError::Storage(format!("remove {}: {e}", path.display()))),
        }
    }

    fn keys(&self) -> DataResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let mut store = MemoryStore::new();
        write_json(&mut store, KEY_THEME, "dark").unwrap();
        assert_eq!(read_json::<String>(&store, KEY_THEME).as_deref(), Some("dark"));
        store.remove(KEY_THEME).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_json_reads_as_none() {
        let mut store = MemoryStore::new();
        store.set("users", "{not json").unwrap();
        assert!(read_json::<Vec<String>>(&store, "users").is_none());
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let mut store = MemoryStore::read_only();
        assert!(matches!(store.set("theme", "\"dark\""), Err(DataError::Storage(_))));
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("store")).unwrap();
        assert_eq!(store.get("currentUser").unwrap(), None);

        store.set("user_42", "{}").unwrap();
        store.set("goal_plan_7", "{}").unwrap();
        assert_eq!(store.get("user_42").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.keys().unwrap(), vec!["goal_plan_7", "user_42"]);

        store.remove("user_42").unwrap();
        store.remove("user_42").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["goal_plan_7"]);

        assert!(store.set("../escape", "x").is_err());
    }

    #[test]
    fn test_user_data_key() {
        assert_eq!(user_data_key(&EntityId::Num(5)), "user_5");
    }
}
