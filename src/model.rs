use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlaybackMode {
    #[default]
    Normal,
    Shuffle,
    Loop,
    LoopOne,
}

impl PlaybackMode {
    pub fn next(self) -> Self {
        match self {
            Self::Normal => Self::Shuffle,
            Self::Shuffle => Self::Loop,
            Self::Loop => Self::LoopOne,
            Self::LoopOne => Self::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Shuffle => "Shuffle",
            Self::Loop => "Loop",
            Self::LoopOne => "Loop one",
        }
    }
}

pub const MAX_VOLUME: u8 = 21;
pub const MAX_BRIGHTNESS_INDEX: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedState {
    #[serde(default)]
    pub playback_mode: PlaybackMode,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default = "default_brightness_index")]
    pub brightness_index: u8,
    #[serde(default)]
    pub queue_directory: Option<String>,
}

fn default_volume() -> u8 {
    10
}

fn default_brightness_index() -> u8 {
    2
}

impl PersistedState {
    /// Clamp values that may have been hand-edited out of range.
    pub fn sanitized(mut self) -> Self {
        self.volume = self.volume.min(MAX_VOLUME);
        self.brightness_index = self.brightness_index.min(MAX_BRIGHTNESS_INDEX);
        self
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            playback_mode: PlaybackMode::Normal,
            volume: default_volume(),
            brightness_index: default_brightness_index(),
            queue_directory: None,
        }
    }
}
