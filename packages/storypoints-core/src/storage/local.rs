/// Local file storage backend.
///
/// All settings live in one JSON object file. Writes are atomic: the new
/// content goes to a `.tmp` sibling that is fsynced and renamed over the file.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SettingsStore, StorageError};

pub struct LocalStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp_path = path.with_extension("storypoints.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl SettingsStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn is_available(&self) -> bool {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                dir.is_dir() || fs::create_dir_all(dir).is_ok()
            }
            _ => true,
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("local store lock poisoned".to_string()))?;
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(StorageError::Corrupt { path, reason }) => {
                log::warn!(
                    "[storypoints.storage.local] Replacing corrupt store {}: {}",
                    path,
                    reason
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&values)?;
        Self::atomic_write(&self.path, &content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("settings.json"));
        assert!(store.is_available());
        assert_eq!(store.get("estimatesSequence").unwrap(), None);
    }

    #[test]
    fn test_set_persists_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = LocalStore::new(&path);
        store.set("estimatesSequence", "1,2,3").unwrap();
        store.set("other", "x").unwrap();

        let reopened = LocalStore::new(&path);
        assert_eq!(
            reopened.get("estimatesSequence").unwrap().as_deref(),
            Some("1,2,3")
        );
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("x"));
        assert!(!path.with_extension("storypoints.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_errors_on_read_and_is_replaced_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let store = LocalStore::new(&path);
        assert!(matches!(
            store.get("estimatesSequence"),
            Err(StorageError::Corrupt { .. })
        ));

        store.set("estimatesSequence", "?,1").unwrap();
        assert_eq!(
            store.get("estimatesSequence").unwrap().as_deref(),
            Some("?,1")
        );
    }
}
