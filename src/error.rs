use std::io;
use thiserror::Error;

/// Failures reported by the library index, queue and browser operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("storage error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("song id {0} is out of range")]
    SongOutOfRange(usize),

    #[error("queue position {0} is out of range")]
    QueueOutOfRange(usize),

    #[error("catalog entry for song {0} is empty")]
    EmptyEntry(usize),

    #[error("no songs found under {dir}")]
    EmptyQueue { dir: String },

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("refusing to delete {0:?}")]
    ProtectedPath(String),

    #[error("nothing selected")]
    NoSelection,
}

impl LibraryError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
