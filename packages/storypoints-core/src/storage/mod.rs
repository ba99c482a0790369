pub mod cookie;
pub mod local;
pub mod memory;

pub use cookie::CookieStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Key/value persistence for settings.
/// Implementations: MemoryStore (synced store stand-in), LocalStore (JSON file),
/// CookieStore (cookie jar file). FallbackStore chains them.
pub trait SettingsStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Whether the backend can be used at all in this environment.
    fn is_available(&self) -> bool;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt store {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("All storage backends failed")]
    AllFailed,
}

/// Ordered chain of backends, most preferred first.
///
/// Reads and writes go to the first available backend that succeeds. A
/// failing backend is logged and the next one is tried.
pub struct FallbackStore {
    backends: Vec<Box<dyn SettingsStore>>,
}

impl FallbackStore {
    pub fn new(backends: Vec<Box<dyn SettingsStore>>) -> Self {
        Self { backends }
    }

    fn available(&self) -> impl Iterator<Item = &dyn SettingsStore> {
        self.backends
            .iter()
            .map(|b| b.as_ref())
            .filter(|b| b.is_available())
    }
}

impl SettingsStore for FallbackStore {
    fn name(&self) -> &str {
        "fallback"
    }

    fn is_available(&self) -> bool {
        self.available().next().is_some()
    }

    /// First value found. A backend that has no value is a miss: a write
    /// may have fallen through to a later backend.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut answered = false;
        for backend in self.available() {
            match backend.get(key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => answered = true,
                Err(e) => log::warn!(
                    "[storypoints.storage] {} failed to read {}: {}",
                    backend.name(),
                    key,
                    e
                ),
            }
        }
        if answered {
            Ok(None)
        } else {
            Err(StorageError::AllFailed)
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        for backend in self.available() {
            match backend.set(key, value) {
                Ok(()) => {
                    log::debug!("[storypoints.storage] Stored {} in {}", key, backend.name());
                    return Ok(());
                }
                Err(e) => log::warn!(
                    "[storypoints.storage] {} failed to write {}: {}",
                    backend.name(),
                    key,
                    e
                ),
            }
        }
        Err(StorageError::AllFailed)
    }
}
