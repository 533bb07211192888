//! A [`CatalogSource`] backed by local directories.
//!
//! Each configured root is walked on every fetch; nothing is cached except
//! the id-to-path table used to hand out `file://` locators.

use crate::catalog::{CatalogSource, ContentUriResolver, LocatorResolver, RawRecord};
use crate::config;
use crate::error::{MediaError, Result};
use crate::folders::folder_key;
use crate::model::{MediaKind, parent_dir};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::UNIX_EPOCH;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "webm", "mov", "avi", "wmv", "flv", "3gp", "ts",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

#[derive(Debug, Default)]
struct FileProbe {
    duration_ms: Option<i64>,
    title: Option<String>,
    album: Option<String>,
}

#[derive(Debug, Default)]
pub struct DirectoryCatalog {
    video_roots: Vec<PathBuf>,
    audio_roots: Vec<PathBuf>,
    served: RwLock<HashMap<(MediaKind, i64), PathBuf>>,
}

impl DirectoryCatalog {
    pub fn new(video_roots: Vec<PathBuf>, audio_roots: Vec<PathBuf>) -> Self {
        Self {
            video_roots,
            audio_roots,
            served: RwLock::new(HashMap::new()),
        }
    }

    fn roots(&self, kind: MediaKind) -> &[PathBuf] {
        match kind {
            MediaKind::Video => &self.video_roots,
            MediaKind::Audio => &self.audio_roots,
        }
    }
}

impl CatalogSource for DirectoryCatalog {
    fn fetch(&self, kind: MediaKind) -> Result<Vec<RawRecord>> {
        let roots = self.roots(kind);
        let missing: Vec<&PathBuf> = roots.iter().filter(|root| !root.is_dir()).collect();
        if !roots.is_empty() && missing.len() == roots.len() {
            return Err(MediaError::source_unavailable(format!(
                "no readable {kind} root among {}",
                roots
                    .iter()
                    .map(|root| root.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        for root in missing {
            warn!(root = %root.display(), %kind, "skipping unreadable root");
        }

        let mut paths: Vec<PathBuf> = roots
            .iter()
            .filter(|root| root.is_dir())
            .flat_map(|root| media_files(root, kind))
            .map(|path| config::normalize_path(&path))
            .collect();
        paths.sort();
        paths.dedup();

        let records: Vec<RawRecord> = paths.iter().map(|path| raw_record(kind, path)).collect();

        let mut served = self.served.write().unwrap_or_else(PoisonError::into_inner);
        served.retain(|(served_kind, _), _| *served_kind != kind);
        for (record, path) in records.iter().zip(paths) {
            served.insert((kind, record.id), path);
        }
        debug!(%kind, files = records.len(), "walked directory catalog");
        Ok(records)
    }
}

impl LocatorResolver for DirectoryCatalog {
    fn resolve(&self, kind: MediaKind, id: i64) -> String {
        let served = self.served.read().unwrap_or_else(PoisonError::into_inner);
        match served.get(&(kind, id)) {
            Some(path) => Url::from_file_path(path)
                .map(|url| url.to_string())
                .unwrap_or_else(|()| format!("file://{}", path.display())),
            None => ContentUriResolver::default().resolve(kind, id),
        }
    }
}

fn media_files(root: &Path, kind: MediaKind) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && has_kind_extension(entry.path(), kind))
        .map(|entry| entry.into_path())
        .collect()
}

fn has_kind_extension(path: &Path, kind: MediaKind) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    let supported = match kind {
        MediaKind::Video => VIDEO_EXTENSIONS,
        MediaKind::Audio => AUDIO_EXTENSIONS,
    };
    supported.iter().any(|candidate| ext.eq_ignore_ascii_case(candidate))
}

fn raw_record(kind: MediaKind, path: &Path) -> RawRecord {
    let probe = probe_file(path);
    let metadata = path.metadata().ok();
    let size_bytes = metadata
        .as_ref()
        .map(|meta| i64::try_from(meta.len()).unwrap_or(i64::MAX));
    let date_added = metadata
        .as_ref()
        .and_then(|meta| meta.modified().ok())
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_secs() as i64);

    let location = path.to_string_lossy().into_owned();
    let file_name = path.file_name().and_then(OsStr::to_str).map(str::to_string);
    let (title, folder_id, folder_label) = match kind {
        // Same key the indexer derives for audio, so a directory holding
        // both kinds is one folder.
        MediaKind::Video => (
            file_name,
            Some(folder_key(parent_dir(&location))),
            path.parent()
                .and_then(Path::file_name)
                .and_then(OsStr::to_str)
                .map(str::to_string),
        ),
        MediaKind::Audio => (probe.title.or(file_name), None, probe.album),
    };

    RawRecord {
        id: path_id(path),
        title,
        path: Some(location),
        duration_ms: probe.duration_ms,
        size_bytes,
        folder_id,
        folder_label,
        mime_type: mime_guess::from_path(path).first_raw().map(str::to_string),
        date_added,
    }
}

/// First eight bytes of the SHA-256 of the path, as a signed id.
fn path_id(path: &Path) -> i64 {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest.as_slice()[..8]);
    i64::from_be_bytes(head)
}

fn probe_file(path: &Path) -> FileProbe {
    let stripped = config::strip_windows_verbatim_prefix(path);
    let Ok(file) = File::open(&stripped) else {
        return FileProbe::default();
    };
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = stripped.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let Ok(mut probed) = get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) else {
        return FileProbe::default();
    };

    let duration_ms = probed
        .format
        .default_track()
        .and_then(|track| codec_duration_ms(&track.codec_params));

    let mut tags: Vec<Tag> = probed
        .format
        .metadata()
        .current()
        .map(|revision| revision.tags().to_vec())
        .unwrap_or_default();
    if let Some(container) = probed.metadata.get()
        && let Some(revision) = container.current()
    {
        tags.extend(revision.tags().iter().cloned());
    }

    FileProbe {
        duration_ms,
        title: tag_value(&tags, StandardTagKey::TrackTitle, &["title"]),
        album: tag_value(&tags, StandardTagKey::Album, &["album"]),
    }
}

fn codec_duration_ms(codec_params: &CodecParameters) -> Option<i64> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        let millis = (time.seconds as f64 * 1000.0 + time.frac * 1000.0).round();
        return Some(millis.clamp(0.0, i64::MAX as f64) as i64);
    }

    if let Some((frame_count, sample_rate)) = codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
    {
        let millis = ((frame_count as f64) * 1000.0 / (sample_rate as f64)).round();
        return Some(millis.clamp(0.0, i64::MAX as f64) as i64);
    }

    None
}

fn tag_value(tags: &[Tag], standard_key: StandardTagKey, fallback_keys: &[&str]) -> Option<String> {
    let from_standard = tags
        .iter()
        .find(|tag| tag.std_key == Some(standard_key))
        .map(|tag| tag.value.to_string());

    let from_fallback = || {
        tags.iter()
            .find(|tag| {
                fallback_keys
                    .iter()
                    .any(|key| tag.key.eq_ignore_ascii_case(key))
            })
            .map(|tag| tag.value.to_string())
    };

    from_standard.or_else(from_fallback).and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then_some(trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folders::aggregate;
    use crate::indexer::normalize;
    use crate::model::KindFilter;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_only_files_of_the_requested_kind() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Clips")).expect("mkdir");
        fs::write(dir.path().join("Clips").join("a.mp4"), b"x").expect("write mp4");
        fs::write(dir.path().join("Clips").join("b.MKV"), b"x").expect("write mkv");
        fs::write(dir.path().join("song.mp3"), b"x").expect("write mp3");
        fs::write(dir.path().join("notes.txt"), b"x").expect("write txt");

        let catalog = DirectoryCatalog::new(vec![dir.path().to_path_buf()], Vec::new());
        let videos = catalog.fetch(MediaKind::Video).expect("fetch");
        assert_eq!(videos.len(), 2);

        let first = &videos[0];
        assert_eq!(first.title.as_deref(), Some("a.mp4"));
        assert_eq!(first.folder_label.as_deref(), Some("Clips"));
        assert_eq!(first.mime_type.as_deref(), Some("video/mp4"));
        assert_eq!(first.size_bytes, Some(1));
        assert!(first.folder_id.is_some());
        assert_eq!(videos[0].folder_id, videos[1].folder_id);
        // Garbage bytes have no decodable duration.
        assert_eq!(first.duration_ms, None);
    }

    #[test]
    fn audio_records_leave_folder_id_for_the_indexer() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("song.mp3"), b"x").expect("write mp3");

        let catalog = DirectoryCatalog::new(Vec::new(), vec![dir.path().to_path_buf()]);
        let audio = catalog.fetch(MediaKind::Audio).expect("fetch");
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].folder_id, None);
        assert_eq!(audio[0].mime_type.as_deref(), Some("audio/mpeg"));
    }

    #[test]
    fn ids_are_stable_and_resolve_to_file_locators() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.mp4"), b"x").expect("write");

        let catalog = DirectoryCatalog::new(vec![dir.path().to_path_buf()], Vec::new());
        let first = catalog.fetch(MediaKind::Video).expect("fetch");
        let second = catalog.fetch(MediaKind::Video).expect("fetch");
        assert_eq!(first[0].id, second[0].id);

        let locator = catalog.resolve(MediaKind::Video, first[0].id);
        assert!(locator.starts_with("file://"), "unexpected locator {locator}");
        assert!(locator.ends_with("a.mp4"));
        assert_eq!(
            catalog.resolve(MediaKind::Audio, 99),
            "content://media/external/audio/media/99"
        );
    }

    #[test]
    fn missing_roots_make_the_source_unavailable() {
        let catalog =
            DirectoryCatalog::new(vec![PathBuf::from("/definitely/not/here")], Vec::new());
        let err = catalog.fetch(MediaKind::Video).expect_err("unavailable");
        assert!(matches!(err, MediaError::SourceUnavailable(_)));
        assert!(catalog.fetch(MediaKind::Audio).expect("no roots").is_empty());
    }

    #[test]
    fn mixed_directory_is_one_folder() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("clip.mp4"), b"x").expect("write mp4");
        fs::write(dir.path().join("song.mp3"), b"x").expect("write mp3");

        let roots = vec![dir.path().to_path_buf()];
        let catalog = DirectoryCatalog::new(roots.clone(), roots);
        let mut records = Vec::new();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            for mut raw in catalog.fetch(kind).expect("fetch") {
                raw.duration_ms = Some(1_000);
                records.extend(normalize(kind, raw, &catalog));
            }
        }
        assert_eq!(records.len(), 2);

        let folders = aggregate(&records, KindFilter::All);
        assert_eq!(folders.len(), 1, "{folders:?}");
        assert_eq!(folders[0].item_count, 2);
        assert_eq!(aggregate(&records, KindFilter::VideoOnly)[0].id, folders[0].id);
    }

    #[test]
    fn tag_lookup_prefers_standard_key_and_trims() {
        use symphonia::core::meta::Value;
        let tags = vec![
            Tag::new(None, "ALBUM", Value::String(String::from("  Fallback  "))),
            Tag::new(Some(StandardTagKey::TrackTitle), "TIT2", Value::String(String::from("  "))),
        ];
        assert_eq!(
            tag_value(&tags, StandardTagKey::Album, &["album"]),
            Some(String::from("Fallback"))
        );
        assert_eq!(tag_value(&tags, StandardTagKey::TrackTitle, &["title"]), None);
    }
}
