/// In-process store, standing in for the host's synced key/value storage.
use std::collections::HashMap;
use std::sync::RwLock;

use super::{SettingsStore, StorageError};

#[derive(Debug)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            available: true,
        }
    }

    /// A store that reports itself unavailable, like a missing browser API.
    pub fn unavailable() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            available: false,
        }
    }
}

impl SettingsStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .read()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
