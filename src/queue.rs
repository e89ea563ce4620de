use crate::error::{LibraryError, Result};
use crate::library;
use crate::model::PlaybackMode;
use crate::paths;
use crate::state::PlayerState;
use crate::storage::Storage;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::io::BufRead;
use tracing::{info, warn};

/// Ordered, directory-scoped list of song ids with selected/playing cursors.
///
/// Both cursors are always inside the queue, or both zero when it is empty.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    songs: Vec<usize>,
    directory: String,
    selected: usize,
    playing: usize,
    shuffle_order: Vec<usize>,
    shuffle_cursor: usize,
    shuffle_rng: SmallRng,
}

impl PlaybackQueue {
    pub fn new(directory: &str) -> Self {
        Self {
            songs: Vec::new(),
            directory: directory.to_string(),
            selected: 0,
            playing: 0,
            shuffle_order: Vec::new(),
            shuffle_cursor: 0,
            shuffle_rng: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    pub fn songs(&self) -> &[usize] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Scope directory the queue was derived from.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn playing(&self) -> usize {
        self.playing
    }

    pub fn song_at(&self, pos: usize) -> Option<usize> {
        self.songs.get(pos).copied()
    }

    pub fn playing_song(&self) -> Option<usize> {
        self.song_at(self.playing)
    }

    pub fn set_selected(&mut self, pos: usize) -> Result<()> {
        if pos >= self.songs.len() {
            return Err(LibraryError::QueueOutOfRange(pos));
        }
        self.selected = pos;
        Ok(())
    }

    pub fn set_playing(&mut self, pos: usize) -> Result<()> {
        if pos >= self.songs.len() {
            return Err(LibraryError::QueueOutOfRange(pos));
        }
        self.playing = pos;
        Ok(())
    }

    pub fn select_next(&mut self) {
        if !self.songs.is_empty() {
            self.selected = (self.selected + 1).min(self.songs.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn reset_cursors(&mut self) {
        self.selected = 0;
        self.playing = 0;
    }

    /// Queue every catalog entry in order, keeping cursors that are still valid.
    pub fn fill_with_library(&mut self, count: usize, directory: &str) {
        self.songs = (0..count).collect();
        self.directory = directory.to_string();
        if self.songs.is_empty() {
            self.reset_cursors();
        } else {
            if self.selected >= self.songs.len() {
                self.selected = 0;
            }
            if self.playing >= self.songs.len() {
                self.playing = self.selected;
            }
        }
        self.rebuild_shuffle_order();
    }

    fn replace(&mut self, songs: Vec<usize>, directory: String) {
        self.songs = songs;
        self.directory = directory;
        self.rebuild_shuffle_order();
    }

    /// Next position to play after `current` under `mode`.
    pub fn next_position(&mut self, mode: PlaybackMode) -> Option<usize> {
        if self.songs.is_empty() {
            return None;
        }
        let current = self.playing;
        match mode {
            PlaybackMode::LoopOne => Some(current),
            PlaybackMode::Normal => {
                let next = current + 1;
                (next < self.songs.len()).then_some(next)
            }
            PlaybackMode::Loop => Some((current + 1) % self.songs.len()),
            PlaybackMode::Shuffle => {
                if self.shuffle_order.len() != self.songs.len() {
                    self.rebuild_shuffle_order();
                }
                if let Some(pos) = self.shuffle_order.iter().position(|idx| *idx == current) {
                    self.shuffle_cursor = pos;
                }
                self.shuffle_cursor = (self.shuffle_cursor + 1) % self.shuffle_order.len();
                self.shuffle_order.get(self.shuffle_cursor).copied()
            }
        }
    }

    fn rebuild_shuffle_order(&mut self) {
        self.shuffle_order = (0..self.songs.len()).collect();
        self.shuffle_order.shuffle(&mut self.shuffle_rng);
        self.shuffle_cursor = 0;
    }
}

/// Rebuild the queue from every catalog entry at or below `dir`.
///
/// Selection prefers `preferred`, then the song playing before the rebuild,
/// then position 0. An empty result resets both cursors and is reported as
/// [`LibraryError::EmptyQueue`]; falling back to a broader scope is up to the caller.
pub fn build_queue_for_directory<S: Storage>(
    storage: &S,
    state: &mut PlayerState,
    dir: &str,
    preferred: Option<usize>,
) -> Result<usize> {
    let dir = paths::normalize_dir(dir);
    let index_path = state.config.index_path.clone();
    let reader = storage.open_read(&index_path).map_err(|source| {
        warn!(path = %index_path, error = %source, "queue build: index not found");
        LibraryError::io(index_path.as_str(), source)
    })?;

    let playing_song = state.queue.playing_song();
    let library_len = state.library.len();
    let limit = state.config.max_library_files;

    let mut songs = Vec::new();
    let mut preferred_pos = None;
    let mut playing_pos = None;
    let mut song = 0usize;
    for line in reader.split(b'\n') {
        if song >= library_len || songs.len() >= limit {
            break;
        }

        let raw = line.map_err(|source| LibraryError::io(index_path.as_str(), source))?;
        let text = String::from_utf8_lossy(&raw);
        let path = text.trim();
        if path.is_empty() {
            continue;
        }

        if paths::in_directory(path, &dir) {
            if preferred == Some(song) {
                preferred_pos = Some(songs.len());
            }
            if playing_song == Some(song) {
                playing_pos = Some(songs.len());
            }
            songs.push(song);
        }
        song += 1;
    }

    state.queue.replace(songs, dir.clone());
    if state.queue.is_empty() {
        state.queue.reset_cursors();
        return Err(LibraryError::EmptyQueue { dir });
    }

    let pos = preferred_pos.or(playing_pos).unwrap_or(0);
    state.queue.selected = pos;
    state.queue.playing = pos;
    state.reset_queue_view();

    info!(dir = %dir, songs = state.queue.len(), "queue rebuilt");
    Ok(state.queue.len())
}

/// Path of the song at queue position `pos`.
pub fn path_at<S: Storage>(storage: &S, state: &mut PlayerState, pos: usize) -> Result<String> {
    let song = state
        .queue
        .song_at(pos)
        .ok_or(LibraryError::QueueOutOfRange(pos))?;
    library::resolve_path(storage, state, song)
}

/// Queue position holding `path`, compared by path equality.
pub fn position_of_path<S: Storage>(
    storage: &S,
    state: &mut PlayerState,
    path: &str,
) -> Option<usize> {
    if path.is_empty() {
        return None;
    }
    (0..state.queue.len()).find(|pos| path_at(storage, state, *pos).is_ok_and(|p| p == path))
}
