//! Flat-file JSON persistence.
//!
//! Every persisted state blob (auto-react settings, deleted-message store,
//! tracker stats) is a small JSON file: read once at startup, written
//! through on mutation. A failed write is logged and the operation
//! continues in memory; the next successful write reconciles.

use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

/// A write-through JSON file for one serializable value.
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Bind a store to a path, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create data dir {}: {}", parent.display(), e);
            }
        }
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Load the stored value, or the default when the file is missing or
    /// unreadable (logged, never fatal).
    pub fn load(&self) -> T {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Corrupt state file {}: {}; using defaults", self.path.display(), e);
                    T::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                warn!("Failed to read {}: {}; using defaults", self.path.display(), e);
                T::default()
            }
        }
    }

    /// Write the value through to disk. Failures are logged and swallowed.
    pub fn save(&self, value: &T) {
        if let Err(e) = self.try_save(value) {
            error!("Failed to persist {}: {}", self.path.display(), e);
        }
    }

    fn try_save(&self, value: &T) -> std::io::Result<()> {
        let raw = serde_json::to_string_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, raw)?;
        debug!("Persisted {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u32,
        names: Vec<String>,
    }

    #[test]
    fn round_trip_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Sample> = JsonStore::open(dir.path().join("sample.json"));

        let value = Sample {
            count: 3,
            names: vec!["a".into(), "b".into()],
        };
        store.save(&value);

        let reloaded: JsonStore<Sample> = JsonStore::open(dir.path().join("sample.json"));
        assert_eq!(reloaded.load(), value);
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Sample> = JsonStore::open(dir.path().join("absent.json"));
        assert_eq!(store.load(), Sample::default());
    }

    #[test]
    fn corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store: JsonStore<Sample> = JsonStore::open(path);
        assert_eq!(store.load(), Sample::default());
    }
}
