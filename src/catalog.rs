//! Boundary with the device media catalog.
//!
//! A [`CatalogSource`] hands back every raw record of one kind as an
//! unordered batch. Optional fields stay optional here; the indexer owns the
//! fallback policy.

use crate::error::{MediaError, Result};
use crate::model::MediaKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub folder_label: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub date_added: Option<i64>,
}

pub trait CatalogSource: Send + Sync {
    fn fetch(&self, kind: MediaKind) -> Result<Vec<RawRecord>>;
}

/// Turns a catalog id into something the player can open.
pub trait LocatorResolver: Send + Sync {
    fn resolve(&self, kind: MediaKind, id: i64) -> String;
}

/// `content://` style locators keyed by kind and id.
#[derive(Debug, Clone)]
pub struct ContentUriResolver {
    base: String,
}

impl ContentUriResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl Default for ContentUriResolver {
    fn default() -> Self {
        Self::new("content://media/external")
    }
}

impl LocatorResolver for ContentUriResolver {
    fn resolve(&self, kind: MediaKind, id: i64) -> String {
        format!("{}/{}/media/{id}", self.base, kind.label())
    }
}

/// Fixed in-memory catalog. Useful for fixtures and for callers that already
/// hold a snapshot from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    batches: HashMap<MediaKind, Vec<RawRecord>>,
    unavailable: bool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, kind: MediaKind, records: Vec<RawRecord>) -> Self {
        self.batches.entry(kind).or_default().extend(records);
        self
    }

    /// Every fetch fails, as if the catalog returned no cursor.
    pub fn unavailable() -> Self {
        Self {
            batches: HashMap::new(),
            unavailable: true,
        }
    }
}

impl CatalogSource for MemoryCatalog {
    fn fetch(&self, kind: MediaKind) -> Result<Vec<RawRecord>> {
        if self.unavailable {
            return Err(MediaError::source_unavailable(format!(
                "{kind} catalog returned no cursor"
            )));
        }
        Ok(self.batches.get(&kind).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_locators_carry_kind_and_id() {
        let resolver = ContentUriResolver::default();
        assert_eq!(
            resolver.resolve(MediaKind::Video, 42),
            "content://media/external/video/media/42"
        );
        assert_eq!(
            resolver.resolve(MediaKind::Audio, 7),
            "content://media/external/audio/media/7"
        );
    }

    #[test]
    fn memory_catalog_keeps_kinds_apart() {
        let catalog = MemoryCatalog::new().with_records(
            MediaKind::Audio,
            vec![RawRecord {
                id: 1,
                ..RawRecord::default()
            }],
        );
        assert!(catalog.fetch(MediaKind::Video).expect("video").is_empty());
        assert_eq!(catalog.fetch(MediaKind::Audio).expect("audio").len(), 1);
    }

    #[test]
    fn unavailable_catalog_reports_source_error() {
        let err = MemoryCatalog::unavailable()
            .fetch(MediaKind::Video)
            .expect_err("fetch fails");
        assert!(matches!(err, MediaError::SourceUnavailable(_)));
    }

    #[test]
    fn raw_records_tolerate_missing_fields() {
        let raw: RawRecord = serde_json::from_str(r#"{"id": 3}"#).expect("parse");
        assert_eq!(raw.id, 3);
        assert_eq!(raw.title, None);
        assert_eq!(raw.duration_ms, None);
    }
}
