use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Folder label used when the catalog gives none.
    pub fn fallback_folder_label(self) -> &'static str {
        match self {
            Self::Video => "Internal Storage",
            Self::Audio => "Unknown Album",
        }
    }

    /// Folder label used when the derived name is blank.
    pub fn generic_folder_label(self) -> &'static str {
        match self {
            Self::Video => "Internal Storage",
            Self::Audio => "Audio",
        }
    }

    pub fn wildcard_mime(self) -> &'static str {
        match self {
            Self::Video => "video/*",
            Self::Audio => "audio/*",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" | "videos" => Ok(Self::Video),
            "audio" | "music" => Ok(Self::Audio),
            other => Err(format!("unknown media kind {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KindFilter {
    All,
    #[default]
    VideoOnly,
    AudioOnly,
}

impl KindFilter {
    pub fn matches(self, kind: MediaKind) -> bool {
        match self {
            Self::All => true,
            Self::VideoOnly => kind == MediaKind::Video,
            Self::AudioOnly => kind == MediaKind::Audio,
        }
    }

    /// Noun used after a folder's item count.
    pub fn count_noun(self) -> &'static str {
        match self {
            Self::All => "media",
            Self::VideoOnly => "videos",
            Self::AudioOnly => "audio",
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            Self::All => "No media folders found",
            Self::VideoOnly => "No video folders found",
            Self::AudioOnly => "No audio folders found",
        }
    }
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "video" | "videos" => Ok(Self::VideoOnly),
            "audio" | "music" => Ok(Self::AudioOnly),
            other => Err(format!("unknown filter {other}")),
        }
    }
}

/// One playable file as surfaced by the indexer. `duration_ms` is always > 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    /// Catalog the record was fetched from. Classification may still differ.
    pub kind: MediaKind,
    pub title: String,
    pub path: String,
    pub locator: String,
    pub duration_ms: u64,
    pub size_bytes: u64,
    pub date_added: i64,
    pub folder_id: i64,
    pub folder_name: String,
    pub mime_type: String,
}

impl MediaRecord {
    /// Directory part of `path`, empty when the path has no separator.
    pub fn folder_path(&self) -> &str {
        parent_dir(&self.path)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_ms)
    }

    pub fn formatted_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub item_count: usize,
}

impl FolderSummary {
    pub fn count_label(&self, filter: KindFilter) -> String {
        format!("{} {}", self.item_count, filter.count_noun())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

pub fn parent_dir(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(index) => &path[..index],
        None => "",
    }
}

pub fn last_segment(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

pub fn format_duration(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

pub fn format_size(size_bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = size_bytes as f64;
    if size >= GB {
        format!("{:.2} GB", size / GB)
    } else if size >= MB {
        format!("{:.1} MB", size / MB)
    } else if size >= KB {
        format!("{:.0} KB", size / KB)
    } else {
        format!("{size_bytes} B")
    }
}
