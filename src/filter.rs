//! Video/audio classification and text search over indexed records.
//!
//! [`classify`] is the only place that decides whether a record is audio.
//! Folder counts, in-folder listings and playback routing all go through it.

use crate::model::{KindFilter, MediaKind, MediaRecord, last_segment};
use unicode_normalization::UnicodeNormalization;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "flac"];

pub fn classify(record: &MediaRecord) -> MediaKind {
    classify_parts(&record.mime_type, &record.path)
}

pub fn classify_parts(mime_type: &str, path: &str) -> MediaKind {
    if mime_type.starts_with("audio") || has_audio_extension(path) {
        MediaKind::Audio
    } else {
        MediaKind::Video
    }
}

/// Text after the last `.` of the file name, so `.mp3` alone still counts.
fn has_audio_extension(path: &str) -> bool {
    let Some((_, ext)) = last_segment(path).rsplit_once('.') else {
        return false;
    };
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

pub fn matches_filter(record: &MediaRecord, filter: KindFilter) -> bool {
    filter.matches(classify(record))
}

/// Keeps records that pass `filter` and, when given a non-empty query,
/// whose title or folder label contains it. Input order is preserved.
pub fn filter<'a>(
    records: &'a [MediaRecord],
    filter: KindFilter,
    query: Option<&str>,
) -> Vec<&'a MediaRecord> {
    let needle = query.map(fold_case).filter(|needle| !needle.is_empty());
    records
        .iter()
        .filter(|record| matches_filter(record, filter))
        .filter(|record| match needle.as_deref() {
            Some(needle) => matches_query(record, needle),
            None => true,
        })
        .collect()
}

fn matches_query(record: &MediaRecord, folded_needle: &str) -> bool {
    fold_case(&record.title).contains(folded_needle)
        || fold_case(&record.folder_name).contains(folded_needle)
}

fn fold_case(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}
