//! Groups indexed records into folders with per-filter item counts.
//!
//! Counts are derived on every call from the records and the active filter;
//! nothing here is cached between filter changes.

use crate::filter::matches_filter;
use crate::model::{FolderSummary, KindFilter, MediaKind, MediaRecord, last_segment};
use std::collections::HashMap;

/// Stable identity for a folder path, used when the catalog has no bucket id.
/// 31-based polynomial over UTF-16 code units, so the same path always maps
/// to the same id across runs and platforms.
pub fn folder_key(folder_path: &str) -> i64 {
    let hash = folder_path
        .encode_utf16()
        .fold(0_i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(i32::from(unit)));
    i64::from(hash)
}

/// Builds folder summaries for `records` under `filter`, largest first.
/// Folders with no matching records are left out. Ties keep the order in
/// which the folders were first seen.
pub fn aggregate(records: &[MediaRecord], filter: KindFilter) -> Vec<FolderSummary> {
    let mut slots: HashMap<i64, usize> = HashMap::new();
    let mut folders: Vec<FolderSummary> = Vec::new();

    for record in records {
        let slot = *slots.entry(record.folder_id).or_insert_with(|| {
            folders.push(FolderSummary {
                id: record.folder_id,
                name: display_name(record),
                path: record.folder_path().to_string(),
                item_count: 0,
            });
            folders.len() - 1
        });
        if matches_filter(record, filter) {
            folders[slot].item_count += 1;
        }
    }

    folders.retain(|folder| folder.item_count > 0);
    folders.sort_by(|a, b| b.item_count.cmp(&a.item_count));
    folders
}

/// Records of one folder that pass `filter`, in input order.
pub fn folder_items(
    records: &[MediaRecord],
    folder_id: i64,
    filter: KindFilter,
) -> Vec<&MediaRecord> {
    records
        .iter()
        .filter(|record| record.folder_id == folder_id && matches_filter(record, filter))
        .collect()
}

fn display_name(record: &MediaRecord) -> String {
    let name = match record.kind {
        MediaKind::Video => record.folder_name.as_str(),
        MediaKind::Audio => {
            let segment = last_segment(record.folder_path());
            if segment.is_empty() {
                record.folder_name.as_str()
            } else {
                segment
            }
        }
    };

    if name.trim().is_empty() {
        record.kind.generic_folder_label().to_string()
    } else {
        name.to_string()
    }
}
