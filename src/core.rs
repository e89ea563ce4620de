use crate::browser::{self, BrowserEntry};
use crate::config::EngineConfig;
use crate::error::{LibraryError, Result};
use crate::library;
use crate::model::PersistedState;
use crate::paths;
use crate::queue;
use crate::state::PlayerState;
use crate::storage::Storage;
use tracing::{info, warn};

/// Notifications raised by [`PlayerCore::delete_selected`].
pub trait DeletionHooks {
    /// The playing song was deleted; the elapsed-time display must restart.
    fn reset_elapsed(&mut self) {}

    fn file_deleted(&mut self, old_selected: usize, new_playing: usize) {
        let _ = (old_selected, new_playing);
    }

    /// The deletion left no songs anywhere on the card.
    fn library_emptied(&mut self) {}
}

impl DeletionHooks for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed {
        old_selected: usize,
        new_playing: usize,
    },
    LibraryEmptied,
}

/// Owns the storage collaborator and the application context.
#[derive(Debug)]
pub struct PlayerCore<S: Storage> {
    pub storage: S,
    pub state: PlayerState,
}

impl<S: Storage> PlayerCore<S> {
    pub fn new(storage: S, config: EngineConfig) -> Self {
        Self {
            storage,
            state: PlayerState::new(config),
        }
    }

    pub fn from_persisted(storage: S, config: EngineConfig, persisted: &PersistedState) -> Self {
        let mut core = Self::new(storage, config);
        core.state.apply_persisted(persisted);
        core
    }

    /// Load the existing catalog, rescanning when there is none, then restore `scope`.
    pub fn open(&mut self, scope: Option<&str>) -> Result<usize> {
        let count = match library::load_index(&self.storage, &mut self.state) {
            Ok(count) => count,
            Err(err) => {
                info!(error = %err, "no usable index, rescanning");
                self.rescan()?
            }
        };

        if let Some(dir) = scope {
            if let Err(err) = self.select_scope(dir) {
                warn!(dir = %dir, error = %err, "could not restore queue scope");
            }
        }
        Ok(count)
    }

    /// Rebuild the catalog from the music directory, or from the card root
    /// when the music directory holds nothing.
    pub fn rescan(&mut self) -> Result<usize> {
        rebuild_with_fallback(&mut self.storage, &mut self.state)
    }

    /// Scope the queue to `dir`, widening to the music directory and then the root.
    pub fn select_scope(&mut self, dir: &str) -> Result<usize> {
        build_queue_with_fallback(&self.storage, &mut self.state, dir)
    }

    pub fn browse(&mut self, dir: &str) -> Result<usize> {
        let count = browser::build_browser_entries(&self.storage, &mut self.state, dir)?;
        self.state.view.browser_mode = true;
        Ok(count)
    }

    /// Open the selected browser entry: enter a directory, or queue the
    /// browsed directory starting at the chosen song. Returns the song path.
    pub fn activate_browser_selection(&mut self) -> Result<Option<String>> {
        let entry = self
            .state
            .browser
            .selected_entry()
            .cloned()
            .ok_or(LibraryError::NoSelection)?;

        match entry {
            BrowserEntry::Directory { path, .. } => {
                self.browse(&path)?;
                Ok(None)
            }
            BrowserEntry::Song { path, song, .. } => {
                let song = match song {
                    Some(song) => song,
                    None => library::find_song_by_path(&self.storage, &mut self.state, &path)
                        .ok_or(LibraryError::NoSelection)?,
                };
                let dir = self.state.browser.current_dir.clone();
                queue::build_queue_for_directory(&self.storage, &mut self.state, &dir, Some(song))
                    .or_else(|_| self.select_scope(&dir))?;
                self.state.view.browser_mode = false;
                self.state.playback.track_switch_requested = true;
                self.state.playback.resume();
                Ok(Some(path))
            }
        }
    }

    pub fn selected_path(&mut self) -> Result<String> {
        let pos = self.state.queue.selected();
        queue::path_at(&self.storage, &mut self.state, pos)
    }

    pub fn playing_path(&mut self) -> Result<String> {
        let pos = self.state.queue.playing();
        queue::path_at(&self.storage, &mut self.state, pos)
    }

    /// Advance the playing cursor according to the playback mode.
    pub fn next_track(&mut self) -> Option<usize> {
        let mode = self.state.playback.mode;
        let Some(pos) = self.state.queue.next_position(mode) else {
            self.state.playback.stop();
            return None;
        };
        self.state.queue.set_playing(pos).ok()?;
        self.state.queue.set_selected(pos).ok()?;
        self.state.playback.track_switch_requested = true;
        Some(pos)
    }

    pub fn cycle_mode(&mut self) {
        self.state.playback.mode = self.state.playback.mode.next();
        info!(mode = self.state.playback.mode.label(), "playback mode changed");
    }

    pub fn persisted_state(&self) -> PersistedState {
        self.state.persisted()
    }

    /// Delete the selected song from the card and repair the queue around it.
    ///
    /// Song ids do not survive the rebuild, so the playing song is followed by
    /// path. On a failed removal nothing changes.
    pub fn delete_selected(&mut self, hooks: &mut impl DeletionHooks) -> Result<DeleteOutcome> {
        let Self { storage, state } = self;

        if state.queue.is_empty() || state.queue.selected() >= state.queue.len() {
            info!("no file to delete");
            return Err(LibraryError::NoSelection);
        }

        let deleted_pos = state.queue.selected();
        let target = queue::path_at(&*storage, state, deleted_pos).inspect_err(|err| {
            warn!(error = %err, "failed to resolve selected file path");
        })?;

        let was_active = state.playback.is_active();
        let deleting_playing = deleted_pos == state.queue.playing();
        let playing_path = if deleting_playing {
            None
        } else {
            let playing = state.queue.playing();
            queue::path_at(&*storage, state, playing).ok()
        };

        info!(path = %target, pos = deleted_pos, "deleting file");
        storage.remove_file(&target).map_err(|source| {
            warn!(path = %target, error = %source, "failed to delete file");
            LibraryError::io(target.as_str(), source)
        })?;
        info!(path = %target, "file deleted");

        let scope = state.queue.directory().to_string();
        if let Err(err) = rebuild_with_fallback(storage, state) {
            warn!(error = %err, "rebuild after delete failed");
        }
        if let Err(err) = build_queue_with_fallback(&*storage, state, &scope) {
            warn!(error = %err, "queue rebuild after delete failed");
        }

        if state.queue.is_empty() {
            state.playback.stop();
            state.queue.reset_cursors();
            info!("no more files available");
            hooks.library_emptied();
            return Ok(DeleteOutcome::LibraryEmptied);
        }

        let last = state.queue.len() - 1;
        let new_playing = match playing_path {
            Some(path) if !deleting_playing => {
                queue::position_of_path(&*storage, state, &path).unwrap_or(0)
            }
            _ => state.queue.selected().min(last),
        };
        state.queue.set_playing(new_playing)?;

        let new_selected = if deleting_playing {
            new_playing
        } else {
            deleted_pos.min(last)
        };
        state.queue.set_selected(new_selected)?;

        if deleting_playing {
            hooks.reset_elapsed();
            state.playback.track_switch_requested = true;
            if was_active {
                state.playback.resume();
            }
        }

        hooks.file_deleted(deleted_pos, new_playing);
        Ok(DeleteOutcome::Removed {
            old_selected: deleted_pos,
            new_playing,
        })
    }
}

fn rebuild_with_fallback<S: Storage>(storage: &mut S, state: &mut PlayerState) -> Result<usize> {
    let music_dir = state.config.music_dir.clone();
    let depth = state.config.scan_max_depth;
    match library::rebuild_index(storage, state, &music_dir, depth) {
        Ok(count) => Ok(count),
        Err(err) => {
            warn!(dir = %music_dir, error = %err, "music directory yielded no songs, scanning card root");
            library::rebuild_index(storage, state, paths::ROOT, depth)
        }
    }
}

fn build_queue_with_fallback<S: Storage>(
    storage: &S,
    state: &mut PlayerState,
    dir: &str,
) -> Result<usize> {
    let music_dir = state.config.music_dir.clone();
    queue::build_queue_for_directory(storage, state, dir, None)
        .or_else(|_| queue::build_queue_for_directory(storage, state, &music_dir, None))
        .or_else(|_| queue::build_queue_for_directory(storage, state, paths::ROOT, None))
}
