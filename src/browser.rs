use crate::error::{LibraryError, Result};
use crate::library;
use crate::paths;
use crate::state::PlayerState;
use crate::storage::Storage;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEntry {
    Directory {
        name: String,
        path: String,
    },
    /// `song` is `None` when the file is not in the catalog.
    Song {
        name: String,
        path: String,
        song: Option<usize>,
    },
}

impl BrowserEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::Song { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Directory { path, .. } | Self::Song { path, .. } => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

/// Listing of one directory for the folder browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserListing {
    pub entries: Vec<BrowserEntry>,
    pub current_dir: String,
    pub selected: usize,
}

impl BrowserListing {
    pub fn new(current_dir: &str) -> Self {
        Self {
            entries: Vec::new(),
            current_dir: current_dir.to_string(),
            selected: 0,
        }
    }

    pub fn selected_entry(&self) -> Option<&BrowserEntry> {
        self.entries.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1).min(self.entries.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn add_directory(&mut self, name: &str, path: String, capacity: usize) -> bool {
        if self
            .entries
            .iter()
            .any(|entry| entry.is_dir() && entry.path() == path)
        {
            return true;
        }
        if self.entries.len() >= capacity {
            return false;
        }
        self.entries.push(BrowserEntry::Directory {
            name: name.to_string(),
            path,
        });
        true
    }

    fn add_song(&mut self, path: String, song: Option<usize>, capacity: usize) -> bool {
        if self.entries.len() >= capacity {
            return false;
        }
        self.entries.push(BrowserEntry::Song {
            name: paths::display_name(&path).to_string(),
            path,
            song,
        });
        true
    }
}

/// List the immediate subdirectories and audio files of `dir`.
///
/// A `..` entry leads to the parent unless `dir` is the root. Entries past
/// the browser capacity are dropped silently.
pub fn build_browser_entries<S: Storage>(
    storage: &S,
    state: &mut PlayerState,
    dir: &str,
) -> Result<usize> {
    let dir = paths::normalize_dir(dir);
    let capacity = state.config.max_browser_entries;
    state.browser = BrowserListing::new(&dir);

    if dir != paths::ROOT {
        state
            .browser
            .add_directory("..", paths::parent(&dir), capacity);
    }

    let children = storage.list_dir(&dir).map_err(|err| {
        warn!(dir = %dir, error = %err, "browser: not a directory");
        LibraryError::NotADirectory(dir.clone())
    })?;

    for child in children {
        if state.browser.entries.len() >= capacity {
            break;
        }

        let path = paths::join(&dir, &child.name);
        let added = if child.is_dir {
            let name = paths::base_name(&path).to_string();
            state.browser.add_directory(&name, path, capacity)
        } else if paths::is_audio_file(&path, &state.config) {
            let song = library::find_song_by_path(storage, state, &path);
            state.browser.add_song(path, song, capacity)
        } else {
            true
        };
        if !added {
            break;
        }
    }

    info!(dir = %dir, entries = state.browser.entries.len(), "browser listing built");
    Ok(state.browser.entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::library::rebuild_index;
    use crate::storage::LocalStorage;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn card(files: &[&str], config: EngineConfig) -> (TempDir, LocalStorage, PlayerState) {
        let dir = tempdir().expect("tempdir");
        for file in files {
            let host = dir.path().join(file.trim_start_matches('/'));
            fs::create_dir_all(host.parent().expect("parent")).expect("mkdir");
            fs::write(host, b"x").expect("write");
        }
        let mut storage = LocalStorage::new(dir.path());
        let mut state = PlayerState::new(config);
        rebuild_index(&mut storage, &mut state, "/music", 6).expect("rebuild");
        (dir, storage, state)
    }

    #[test]
    fn lists_parent_subdirs_and_songs() {
        let (_dir, storage, mut state) = card(
            &["/music/a.mp3", "/music/albums/b.mp3", "/music/cover.jpg"],
            EngineConfig::default(),
        );

        let count = build_browser_entries(&storage, &mut state, "/music").expect("browse");
        assert_eq!(count, 3);
        assert_eq!(
            state.browser.entries,
            vec![
                BrowserEntry::Directory {
                    name: String::from(".."),
                    path: String::from("/"),
                },
                BrowserEntry::Song {
                    name: String::from("a"),
                    path: String::from("/music/a.mp3"),
                    song: Some(0),
                },
                BrowserEntry::Directory {
                    name: String::from("albums"),
                    path: String::from("/music/albums"),
                },
            ]
        );
        assert_eq!(state.browser.current_dir, "/music");
    }

    #[test]
    fn root_listing_has_no_parent_entry() {
        let (_dir, storage, mut state) = card(&["/music/a.mp3"], EngineConfig::default());
        build_browser_entries(&storage, &mut state, "/").expect("browse");
        assert!(state.browser.entries.iter().all(|entry| entry.name() != ".."));
        assert!(
            state
                .browser
                .entries
                .iter()
                .any(|entry| entry.path() == "/music")
        );
    }

    #[test]
    fn uncataloged_song_keeps_unresolved_id() {
        let (dir, storage, mut state) = card(&["/music/a.mp3"], EngineConfig::default());
        fs::write(dir.path().join("music").join("new.mp3"), b"x").expect("write");

        build_browser_entries(&storage, &mut state, "/music").expect("browse");
        let fresh = state
            .browser
            .entries
            .iter()
            .find(|entry| entry.path() == "/music/new.mp3")
            .expect("listed");
        assert!(matches!(fresh, BrowserEntry::Song { song: None, .. }));
    }

    #[test]
    fn listing_stops_at_capacity() {
        let (_dir, storage, mut state) = card(
            &["/music/a.mp3", "/music/b.mp3", "/music/c.mp3", "/music/d.mp3"],
            EngineConfig {
                max_browser_entries: 3,
                ..EngineConfig::default()
            },
        );

        assert_eq!(build_browser_entries(&storage, &mut state, "/music").expect("browse"), 3);
        assert_eq!(state.browser.entries[2].path(), "/music/b.mp3");
    }

    #[test]
    fn missing_directory_is_reported() {
        let (_dir, storage, mut state) = card(&["/music/a.mp3"], EngineConfig::default());
        state.browser.selected = 4;

        let err = build_browser_entries(&storage, &mut state, "/music/nope").expect_err("missing");
        assert!(matches!(err, LibraryError::NotADirectory(_)));
        assert_eq!(state.browser.selected, 0);
        assert_eq!(state.browser.entries.len(), 1);
    }

    #[test]
    fn duplicate_directory_targets_are_skipped() {
        let mut listing = BrowserListing::new("/music");
        assert!(listing.add_directory("rock", String::from("/music/rock"), 8));
        assert!(listing.add_directory("rock", String::from("/music/rock"), 8));
        assert_eq!(listing.entries.len(), 1);
    }
}
