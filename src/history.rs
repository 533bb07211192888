//! Bounded "recently played" lists.
//!
//! Each [`History`] is one independent list: newest entry first, unique by
//! key, never longer than its cap. Every mutation rewrites the whole list to
//! the key-value store before returning. The list lock is held across the
//! read-modify-write, so two `record` calls on the same list cannot race.

use crate::error::{MediaError, Result};
use crate::kv::KeyValueStore;
use crate::model::HistoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub const VIDEO_HISTORY_CAP: usize = 20;
pub const AUDIO_HISTORY_CAP: usize = 50;
pub const STREAM_HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    Video,
    Audio,
    Stream,
}

impl HistoryKind {
    pub const ALL: [Self; 3] = [Self::Video, Self::Audio, Self::Stream];

    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Video => "video_history",
            Self::Audio => "audio_history",
            Self::Stream => "stream_history",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Stream => "stream",
        }
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "stream" | "url" => Ok(Self::Stream),
            other => Err(format!("unknown history {other}")),
        }
    }
}

pub struct History {
    storage_key: String,
    cap: usize,
    entries: Mutex<Vec<HistoryEntry>>,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("storage_key", &self.storage_key)
            .field("cap", &self.cap)
            .finish_non_exhaustive()
    }
}

impl History {
    /// Loads the list stored under `storage_key`. Unreadable data is treated
    /// as an empty history.
    pub fn open(store: Arc<dyn KeyValueStore>, storage_key: impl Into<String>, cap: usize) -> Self {
        let storage_key = storage_key.into();
        let mut entries = load_entries(store.as_ref(), &storage_key);
        entries.truncate(cap);
        Self {
            storage_key,
            cap,
            entries: Mutex::new(entries),
            store,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Newest first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<HistoryEntry> {
        self.lock().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn record(&self, key: &str, title: Option<String>) -> Result<()> {
        self.record_capped(key, title, self.cap)
    }

    /// Moves `key` to the front (inserting it if new) and trims the oldest
    /// entries beyond `cap`.
    pub fn record_capped(&self, key: &str, title: Option<String>, cap: usize) -> Result<()> {
        let mut entries = self.lock();
        let floor = entries.first().map_or(i64::MIN, |entry| entry.timestamp);

        let mut next: Vec<HistoryEntry> = Vec::with_capacity(entries.len() + 1);
        next.push(HistoryEntry {
            key: key.to_string(),
            timestamp: now_epoch_millis().max(floor),
            title,
        });
        next.extend(entries.iter().filter(|entry| entry.key != key).cloned());
        next.truncate(cap);

        self.persist(&next)?;
        debug!(history = %self.storage_key, len = next.len(), "recorded history entry");
        *entries = next;
        Ok(())
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.lock();
        let next: Vec<HistoryEntry> = entries
            .iter()
            .filter(|entry| entry.key != key)
            .cloned()
            .collect();
        if next.len() == entries.len() {
            return Ok(false);
        }
        self.persist(&next)?;
        *entries = next;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        let mut entries = self.lock();
        self.persist(&[])?;
        entries.clear();
        Ok(())
    }

    fn persist(&self, entries: &[HistoryEntry]) -> Result<()> {
        let json = encode_entries(entries)?;
        self.store.put(&self.storage_key, json)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCaps {
    pub video: usize,
    pub audio: usize,
    pub stream: usize,
}

impl Default for HistoryCaps {
    fn default() -> Self {
        Self {
            video: VIDEO_HISTORY_CAP,
            audio: AUDIO_HISTORY_CAP,
            stream: STREAM_HISTORY_CAP,
        }
    }
}

impl HistoryCaps {
    pub fn for_kind(&self, kind: HistoryKind) -> usize {
        match kind {
            HistoryKind::Video => self.video,
            HistoryKind::Audio => self.audio,
            HistoryKind::Stream => self.stream,
        }
    }
}

/// The video, audio and stream histories over one shared store.
#[derive(Debug)]
pub struct HistoryStore {
    histories: HashMap<HistoryKind, History>,
}

impl HistoryStore {
    pub fn open(store: Arc<dyn KeyValueStore>, caps: HistoryCaps) -> Self {
        let histories = HistoryKind::ALL
            .into_iter()
            .map(|kind| {
                let history = History::open(store.clone(), kind.storage_key(), caps.for_kind(kind));
                (kind, history)
            })
            .collect();
        Self { histories }
    }

    pub fn history(&self, kind: HistoryKind) -> &History {
        &self.histories[&kind]
    }

    pub fn record(&self, kind: HistoryKind, key: &str, title: Option<String>) -> Result<()> {
        self.history(kind).record(key, title)
    }

    pub fn list(&self, kind: HistoryKind) -> Vec<HistoryEntry> {
        self.history(kind).list()
    }

    pub fn last(&self, kind: HistoryKind) -> Option<HistoryEntry> {
        self.history(kind).last()
    }

    pub fn remove(&self, kind: HistoryKind, key: &str) -> Result<bool> {
        self.history(kind).remove(key)
    }

    pub fn clear(&self, kind: HistoryKind) -> Result<()> {
        self.history(kind).clear()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Plain(String),
    Full {
        #[serde(alias = "url")]
        key: String,
        #[serde(default)]
        timestamp: i64,
        #[serde(default)]
        title: Option<String>,
    },
}

pub fn encode_entries(entries: &[HistoryEntry]) -> Result<String> {
    serde_json::to_string(entries).map_err(|err| MediaError::persistence(err.to_string()))
}

/// Parses a persisted list into newest-first order.
///
/// A list made only of bare strings is the older layout, stored oldest
/// first. Equal timestamps keep their persisted order.
pub fn decode_entries(raw: &str) -> Result<Vec<HistoryEntry>> {
    let stored: Vec<StoredEntry> =
        serde_json::from_str(raw).map_err(|err| MediaError::corruption(err.to_string()))?;
    let legacy = stored
        .iter()
        .all(|entry| matches!(entry, StoredEntry::Plain(_)));

    let mut entries: Vec<HistoryEntry> = stored
        .into_iter()
        .map(|entry| match entry {
            StoredEntry::Plain(key) => HistoryEntry {
                key,
                timestamp: 0,
                title: None,
            },
            StoredEntry::Full {
                key,
                timestamp,
                title,
            } => HistoryEntry {
                key,
                timestamp,
                title,
            },
        })
        .collect();
    if legacy {
        entries.reverse();
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.key.clone()));
    Ok(entries)
}

fn load_entries(store: &dyn KeyValueStore, storage_key: &str) -> Vec<HistoryEntry> {
    let Some(raw) = store.get(storage_key) else {
        return Vec::new();
    };
    match decode_entries(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(history = storage_key, error = %err, "discarding unreadable history");
            Vec::new()
        }
    }
}

pub fn now_epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
