//! Application context threaded through every engine call.

use crate::browser::BrowserListing;
use crate::cache::PathCache;
use crate::config::EngineConfig;
use crate::library::LibraryIndex;
use crate::model::{PersistedState, PlaybackMode};
use crate::queue::PlaybackQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFlags {
    pub is_playing: bool,
    pub stopped: bool,
    /// Set when the audio layer must (re)open the song under the playing cursor.
    pub track_switch_requested: bool,
    pub mode: PlaybackMode,
    pub volume: u8,
    pub brightness_index: u8,
}

impl PlaybackFlags {
    pub fn is_active(&self) -> bool {
        self.is_playing && !self.stopped
    }

    pub fn stop(&mut self) {
        self.is_playing = false;
        self.stopped = true;
    }

    pub fn resume(&mut self) {
        self.is_playing = true;
        self.stopped = false;
    }
}

impl Default for PlaybackFlags {
    fn default() -> Self {
        Self {
            is_playing: true,
            stopped: false,
            track_switch_requested: false,
            mode: PlaybackMode::Normal,
            volume: 10,
            brightness_index: 2,
        }
    }
}

/// Queue-relative list view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// Queue position last rendered; `None` forces a redraw.
    pub last_shown: Option<usize>,
    pub scroll_pos: i32,
    pub browser_mode: bool,
}

/// Cover art streamed out of an ID3 tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub expected_len: usize,
}

impl CoverArt {
    pub fn with_expected_len(expected_len: usize) -> Self {
        Self {
            data: Vec::with_capacity(expected_len),
            expected_len,
        }
    }

    /// Append a chunk, never growing past the announced length.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> usize {
        let room = self.expected_len.saturating_sub(self.data.len());
        let take = room.min(chunk.len());
        self.data.extend_from_slice(&chunk[..take]);
        take
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.expected_len
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Id3Snapshot {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub content_type: String,
    pub cover: Option<CoverArt>,
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub config: EngineConfig,
    pub library: LibraryIndex,
    pub cache: PathCache,
    pub queue: PlaybackQueue,
    pub browser: BrowserListing,
    pub playback: PlaybackFlags,
    pub view: ViewState,
    pub id3: Id3Snapshot,
}

impl PlayerState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            library: LibraryIndex::default(),
            cache: PathCache::new(config.file_path_cache_size),
            queue: PlaybackQueue::new(&config.music_dir),
            browser: BrowserListing::new(&config.music_dir),
            playback: PlaybackFlags::default(),
            view: ViewState {
                last_shown: None,
                scroll_pos: config.scroll_initial_pos,
                browser_mode: false,
            },
            id3: Id3Snapshot::default(),
            config,
        }
    }

    pub fn apply_persisted(&mut self, persisted: &PersistedState) {
        self.playback.mode = persisted.playback_mode;
        self.playback.volume = persisted.volume;
        self.playback.brightness_index = persisted.brightness_index;
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            playback_mode: self.playback.mode,
            volume: self.playback.volume,
            brightness_index: self.playback.brightness_index,
            queue_directory: Some(self.queue.directory().to_string()),
        }
    }

    /// Drop the offset table, queue, browser listing and path cache.
    pub fn reset_library(&mut self) {
        self.library.clear();
        self.queue = PlaybackQueue::new(&self.config.music_dir);
        self.cache.clear();
        self.reset_browser();
    }

    pub fn reset_browser(&mut self) {
        self.browser = BrowserListing::new(&self.config.music_dir);
        self.view.browser_mode = false;
    }

    pub fn reset_queue_view(&mut self) {
        self.view.last_shown = None;
        self.view.scroll_pos = self.config.scroll_initial_pos;
    }

    pub fn reset_id3(&mut self) {
        self.id3 = Id3Snapshot::default();
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
