//! Filesystem collaborator.
//!
//! The engine only talks to storage through [`Storage`]. Paths are absolute
//! device paths (`/music/a.mp3`); [`LocalStorage`] maps them under a host
//! directory standing in for the SD card.

use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, Write};
use std::path::PathBuf;
use walkdir::WalkDir;

/// One immediate child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait Storage {
    type Reader: BufRead + Seek;
    type Writer: Write;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader>;

    /// Open for writing, truncating any existing file.
    fn create(&mut self, path: &str) -> io::Result<Self::Writer>;

    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;

    fn create_dir(&mut self, path: &str) -> io::Result<()>;

    /// Immediate children of `path`; errors when `path` is not a directory.
    fn list_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    fn remove_file(&mut self, path: &str) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&mut self, path: &str) -> io::Result<()>;
}

/// [`Storage`] backed by `std::fs`, rooted at a host directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create from the `POCKETUNE_ROOT` environment variable.
    pub fn from_env() -> Option<Self> {
        std::env::var("POCKETUNE_ROOT").ok().map(Self::new)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Host path for a device path. `..` never leaves the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        let mut depth = 0usize;
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if depth > 0 {
                        full.pop();
                        depth -= 1;
                    }
                }
                name => {
                    full.push(name);
                    depth += 1;
                }
            }
        }
        full
    }
}

impl Storage for LocalStorage {
    type Reader = BufReader<fs::File>;
    type Writer = BufWriter<fs::File>;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        fs::File::open(self.resolve(path)).map(BufReader::new)
    }

    fn create(&mut self, path: &str) -> io::Result<Self::Writer> {
        fs::File::create(self.resolve(path)).map(BufWriter::new)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn create_dir(&mut self, path: &str) -> io::Result<()> {
        fs::create_dir(self.resolve(path))
    }

    fn list_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let full = self.resolve(path);
        if !full.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", full.display()),
            ));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&full)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: entry.file_type().is_dir(),
            });
        }
        Ok(entries)
    }

    fn remove_file(&mut self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn remove_dir(&mut self, path: &str) -> io::Result<()> {
        fs::remove_dir(self.resolve(path))
    }
}
