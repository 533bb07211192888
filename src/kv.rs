//! Opaque string key-value persistence used by the history and log stores.

use crate::error::{MediaError, Result};
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::warn;

/// A `put` that returns `Ok` must be durable.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// All keys live in one JSON object on disk. Every write rewrites the file
/// through a temporary sibling and a rename, so a crash leaves either the
/// old or the new contents.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(values) => values,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "store file unreadable, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stages the new contents beside the store file, syncs them, renames
    /// over the store file and then syncs the directory entry.
    fn flush(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let json = serde_json::to_string_pretty(values)?;
        let mut staging = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to stage a write in {}", parent.display()))?;
        staging.write_all(json.as_bytes())?;
        staging
            .as_file()
            .sync_all()
            .context("failed to sync staged store file")?;
        staging
            .persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        #[cfg(unix)]
        fs::File::open(parent)
            .and_then(|dir| dir.sync_all())
            .with_context(|| format!("failed to sync {}", parent.display()))?;
        Ok(())
    }

    fn write_through(&self, update: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = values.clone();
        update(&mut next);
        self.flush(&next)
            .map_err(|err| MediaError::persistence(format!("{err:#}")))?;
        *values = next;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        self.write_through(|values| {
            values.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write_through(|values| {
            values.remove(key);
        })
    }
}
