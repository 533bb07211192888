use crate::history::HistoryCaps;
use crate::model::KindFilter;
use crate::player_log::MAX_LOG_ENTRIES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "mediashelf";
const SETTINGS_FILE: &str = "settings.json";
const STORE_FILE: &str = "store.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub video_roots: Vec<PathBuf>,
    #[serde(default)]
    pub audio_roots: Vec<PathBuf>,
    #[serde(default)]
    pub history_caps: HistoryCaps,
    #[serde(default = "default_log_cap")]
    pub log_cap: usize,
    #[serde(default)]
    pub default_filter: KindFilter,
}

fn default_log_cap() -> usize {
    MAX_LOG_ENTRIES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            video_roots: Vec::new(),
            audio_roots: Vec::new(),
            history_caps: HistoryCaps::default(),
            log_cap: default_log_cap(),
            default_filter: KindFilter::default(),
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("MEDIASHELF_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn store_path() -> Result<PathBuf> {
    Ok(config_root()?.join(STORE_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path()?)
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    ensure_config_dir()?;
    save_settings_to(&settings_path()?, settings)
}

fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn settings_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);

        let settings = Settings {
            video_roots: vec![PathBuf::from("/media/videos")],
            default_filter: KindFilter::AudioOnly,
            log_cap: 100,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).expect("save");
        assert_eq!(load_settings_from(&path).expect("load"), settings);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"audio_roots": ["/music"]}"#).expect("write");

        let settings = load_settings_from(&path).expect("load");
        assert_eq!(settings.audio_roots, vec![PathBuf::from("/music")]);
        assert_eq!(settings.history_caps.video, 20);
        assert_eq!(settings.history_caps.audio, 50);
        assert_eq!(settings.history_caps.stream, 100);
        assert_eq!(settings.log_cap, 500);
        assert_eq!(settings.default_filter, KindFilter::VideoOnly);
    }

    #[test]
    fn unparsable_settings_report_the_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{").expect("write");

        let err = load_settings_from(&path).expect_err("parse error");
        assert!(format!("{err:#}").contains("failed to parse settings file"));
    }

    #[test]
    fn strips_windows_verbatim_prefix() {
        let cleaned = strip_windows_verbatim_prefix(Path::new(r"\\?\E:\VIDEOS\a.mp4"));
        assert_eq!(cleaned, PathBuf::from(r"E:\VIDEOS\a.mp4"));
    }
}
