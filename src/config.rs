use crate::model::PersistedState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pocketune";
const CONFIG_FILE: &str = "config.json";
const STATE_FILE: &str = "state.json";

/// Capacities, well-known device paths and the audio allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_library_files: usize,
    pub file_path_cache_size: usize,
    pub max_browser_entries: usize,
    pub scan_max_depth: u8,
    pub audio_extensions: Vec<String>,
    pub music_dir: String,
    pub index_path: String,
    pub screen_dir: String,
    pub scroll_initial_pos: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_library_files: 2048,
            file_path_cache_size: 32,
            max_browser_entries: 128,
            scan_max_depth: 6,
            audio_extensions: vec![String::from("mp3"), String::from("wav")],
            music_dir: String::from("/music"),
            index_path: String::from("/.library_index.txt"),
            screen_dir: String::from("/screen"),
            scroll_initial_pos: 8,
        }
    }
}

impl EngineConfig {
    pub fn is_audio_extension(&self, ext: &str) -> bool {
        self.audio_extensions
            .iter()
            .any(|supported| ext.eq_ignore_ascii_case(supported))
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("POCKETUNE_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_config() -> Result<EngineConfig> {
    read_json_or_default(&config_root()?.join(CONFIG_FILE))
}

pub fn load_state() -> Result<PersistedState> {
    let state: PersistedState = read_json_or_default(&config_root()?.join(STATE_FILE))?;
    Ok(state.sanitized())
}

pub fn save_state(state: &PersistedState) -> Result<()> {
    let path = ensure_config_dir()?.join(STATE_FILE);
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
