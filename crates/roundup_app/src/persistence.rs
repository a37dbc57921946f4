//! Durable key-value store backing the rate limiter across restarts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use roundup_core::{KeyValueStore, StoreError};
use roundup_engine::AtomicFileWriter;
use roundup_logging::{roundup_info, roundup_warn};
use serde::{Deserialize, Serialize};

const STATE_FILENAME: &str = "state.ron";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    entries: BTreeMap<String, String>,
}

/// Keeps every entry in memory and rewrites `state.ron` on each change.
pub(crate) struct FileStore {
    writer: AtomicFileWriter,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Loads `{dir}/state.ron`. A missing or unreadable file starts empty.
    pub(crate) fn open(dir: &Path) -> Self {
        Self {
            writer: AtomicFileWriter::new(PathBuf::from(dir)),
            entries: Mutex::new(load_entries(&dir.join(STATE_FILENAME))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let state = PersistedState {
            entries: entries.clone(),
        };
        let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        self.writer
            .write(STATE_FILENAME, content.as_bytes())
            .map_err(|err| {
                StoreError::Unavailable(format!(
                    "writing {:?}: {}",
                    self.writer.dir().join(STATE_FILENAME),
                    err
                ))
            })?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&entries)
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return BTreeMap::new();
        }
        Err(err) => {
            roundup_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return BTreeMap::new();
        }
    };

    match ron::from_str::<PersistedState>(&content) {
        Ok(state) => {
            roundup_info!("Loaded persisted state from {:?}", path);
            state.entries
        }
        Err(err) => {
            roundup_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use roundup_core::{RateLimiter, RATE_LIMIT_KEY};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn entries_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path());
        store.set("a", "1").unwrap();
        store.set("b", "two").unwrap();
        store.remove("a").unwrap();

        let reopened = FileStore::open(temp.path());
        assert_eq!(reopened.get("a").unwrap(), None);
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn missing_dir_is_created_on_first_write() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("roundup");
        let store = FileStore::open(&dir);
        assert_eq!(store.get("anything").unwrap(), None);

        store.set("k", "v").unwrap();
        assert!(dir.join(STATE_FILENAME).is_file());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(STATE_FILENAME), "(entries: {").unwrap();

        let store = FileStore::open(temp.path());
        assert_eq!(store.get(RATE_LIMIT_KEY).unwrap(), None);
    }

    #[test]
    fn running_flag_persists_across_limiters() {
        let temp = TempDir::new().unwrap();
        let limiter = RateLimiter::new(Arc::new(FileStore::open(temp.path())));
        limiter.record_pipeline_start().unwrap();

        let after_restart = RateLimiter::new(Arc::new(FileStore::open(temp.path())));
        assert!(after_restart.state().is_running);
        assert!(!after_restart.can_run_pipeline().can_run);

        after_restart.manual_clear_running().unwrap();
        let again = RateLimiter::new(Arc::new(FileStore::open(temp.path())));
        assert!(again.can_run_pipeline().can_run);
    }
}
