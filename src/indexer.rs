use crate::catalog::{CatalogSource, LocatorResolver, RawRecord};
use crate::error::MediaError;
use crate::folders::folder_key;
use crate::model::{MediaKind, MediaRecord, parent_dir};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, warn};

const UNKNOWN_TITLE: &str = "Unknown";

/// Result of one catalog fetch. A failed fetch is an empty scan carrying the
/// error, so callers can show an empty state without special casing.
#[derive(Debug)]
pub struct Scan {
    pub kind: MediaKind,
    pub records: Vec<MediaRecord>,
    pub error: Option<MediaError>,
}

impl Scan {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            error: None,
        }
    }
}

#[derive(Clone)]
pub struct MediaIndexer {
    catalog: Arc<dyn CatalogSource>,
    resolver: Arc<dyn LocatorResolver>,
}

impl std::fmt::Debug for MediaIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaIndexer").finish_non_exhaustive()
    }
}

impl MediaIndexer {
    pub fn new(catalog: Arc<dyn CatalogSource>, resolver: Arc<dyn LocatorResolver>) -> Self {
        Self { catalog, resolver }
    }

    /// Fetches every record of `kind`, drops invalid entries and returns the
    /// rest newest first.
    pub fn index(&self, kind: MediaKind) -> Scan {
        let raw = match self.catalog.fetch(kind) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%kind, error = %err, "catalog fetch failed");
                return Scan {
                    kind,
                    records: Vec::new(),
                    error: Some(err),
                };
            }
        };

        let fetched = raw.len();
        let mut records: Vec<MediaRecord> = raw
            .into_iter()
            .filter_map(|entry| normalize(kind, entry, self.resolver.as_ref()))
            .collect();
        records.sort_by_key(|record| Reverse(record.date_added));

        debug!(%kind, fetched, kept = records.len(), "indexed catalog batch");
        Scan {
            kind,
            records,
            error: None,
        }
    }
}

/// Applies the fallback policy to one raw entry. Entries without a positive
/// duration are placeholders and yield `None`.
pub fn normalize(
    kind: MediaKind,
    raw: RawRecord,
    resolver: &dyn LocatorResolver,
) -> Option<MediaRecord> {
    let duration_ms = raw.duration_ms.filter(|duration| *duration > 0)?;

    let path = raw.path.unwrap_or_default();
    let folder_id = raw
        .folder_id
        .unwrap_or_else(|| folder_key(parent_dir(&path)));

    Some(MediaRecord {
        id: raw.id,
        kind,
        title: non_blank(raw.title).unwrap_or_else(|| String::from(UNKNOWN_TITLE)),
        locator: resolver.resolve(kind, raw.id),
        path,
        duration_ms: duration_ms as u64,
        size_bytes: raw.size_bytes.unwrap_or(0).max(0) as u64,
        date_added: raw.date_added.unwrap_or(0),
        folder_id,
        folder_name: non_blank(raw.folder_label)
            .unwrap_or_else(|| kind.fallback_folder_label().to_string()),
        mime_type: non_blank(raw.mime_type).unwrap_or_else(|| kind.wildcard_mime().to_string()),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
