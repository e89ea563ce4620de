//! On-disk catalog of audio paths and its in-memory offset table.
//!
//! The catalog is a newline-delimited list of absolute paths. A song id is
//! the position of a non-empty line, so ids are reassigned on every rebuild
//! and must never be used as identity across one.

use crate::config::EngineConfig;
use crate::error::{LibraryError, Result};
use crate::paths;
use crate::state::PlayerState;
use crate::storage::Storage;
use std::io::{self, BufRead, Seek, SeekFrom, Write};
use tracing::{debug, info, warn};

/// Song id → byte offset of its line in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryIndex {
    offsets: Vec<u64>,
}

impl LibraryIndex {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offset(&self, song: usize) -> Option<u64> {
        self.offsets.get(song).copied()
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    fn push(&mut self, offset: u64) {
        self.offsets.push(offset);
    }
}

/// Rescan `root` into a fresh catalog and load it.
///
/// The previous catalog is removed before scanning starts. `max_depth` is the
/// number of nested directory levels to descend; `0` indexes only `root`.
pub fn rebuild_index<S: Storage>(
    storage: &mut S,
    state: &mut PlayerState,
    root: &str,
    max_depth: u8,
) -> Result<usize> {
    let dir = paths::normalize_dir(root);
    info!(root = %dir, max_depth, "rebuilding library index");

    let music_dir = state.config.music_dir.clone();
    if !storage.exists(&music_dir) {
        if let Err(err) = storage.create_dir(&music_dir) {
            warn!(dir = %music_dir, error = %err, "failed to create music directory");
        }
    }

    let index_path = state.config.index_path.clone();
    if storage.exists(&index_path) {
        if let Err(err) = storage.remove_file(&index_path) {
            warn!(path = %index_path, error = %err, "failed to remove old index");
        }
    }

    let mut out = storage.create(&index_path).map_err(|source| {
        warn!(path = %index_path, error = %source, "failed to create index file");
        LibraryError::io(index_path.as_str(), source)
    })?;

    let mut count = 0;
    let scanned = scan_directory(&*storage, &state.config, &dir, max_depth, &mut out, &mut count)
        .and_then(|()| out.flush());
    drop(out);
    if let Err(err) = scanned {
        warn!(path = %index_path, error = %err, "index write failed, catalog may be partial");
    }

    if count >= state.config.max_library_files {
        warn!(
            limit = state.config.max_library_files,
            "library scan stopped at capacity, remaining files skipped"
        );
    }
    info!(songs = count, "index build finished");

    load_index(&*storage, state)
}

fn scan_directory<S: Storage, W: Write>(
    storage: &S,
    config: &EngineConfig,
    dir: &str,
    levels: u8,
    out: &mut W,
    count: &mut usize,
) -> io::Result<()> {
    if *count >= config.max_library_files {
        return Ok(());
    }

    let entries = match storage.list_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir, error = %err, "scan skip: not a directory");
            return Ok(());
        }
    };

    for entry in entries {
        if *count >= config.max_library_files {
            break;
        }

        let path = paths::join(dir, &entry.name);
        if entry.is_dir {
            if let Some(remaining) = levels.checked_sub(1) {
                scan_directory(storage, config, &path, remaining, out, count)?;
            }
        } else if paths::is_audio_file(&path, config) {
            writeln!(out, "{path}")?;
            *count += 1;
        }
    }
    Ok(())
}

/// Read the catalog into the offset table and derive the whole-library queue.
///
/// Fails when the catalog cannot be opened or holds no songs.
pub fn load_index<S: Storage>(storage: &S, state: &mut PlayerState) -> Result<usize> {
    state.reset_library();

    let index_path = state.config.index_path.clone();
    let mut reader = storage.open_read(&index_path).map_err(|source| {
        warn!(path = %index_path, error = %source, "index not found");
        LibraryError::io(index_path.as_str(), source)
    })?;

    let limit = state.config.max_library_files;
    let mut offset = 0u64;
    let mut line = Vec::new();
    while state.library.len() < limit {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| LibraryError::io(index_path.as_str(), source))?;
        if read == 0 {
            break;
        }

        let line_start = offset;
        offset += read as u64;
        if String::from_utf8_lossy(&line).trim().is_empty() {
            continue;
        }
        state.library.push(line_start);
    }

    let count = state.library.len();
    let music_dir = state.config.music_dir.clone();
    state.queue.fill_with_library(count, &music_dir);
    state.cache.clear();

    info!(library = count, queue = state.queue.len(), "loaded index");
    if count >= limit {
        warn!(limit, "reached library capacity");
    }

    if state.queue.is_empty() {
        return Err(LibraryError::EmptyQueue { dir: music_dir });
    }
    Ok(count)
}

/// Path of `song`, served from the path cache or read from its catalog offset.
pub fn resolve_path<S: Storage>(
    storage: &S,
    state: &mut PlayerState,
    song: usize,
) -> Result<String> {
    let offset = state
        .library
        .offset(song)
        .ok_or(LibraryError::SongOutOfRange(song))?;

    if let Some(path) = state.cache.get(song) {
        debug!(song, "path cache hit");
        return Ok(path.to_string());
    }

    let line = {
        let index_path = state.config.index_path.as_str();
        let mut reader = storage
            .open_read(index_path)
            .map_err(|source| LibraryError::io(index_path, source))?;
        if let Err(source) = reader.seek(SeekFrom::Start(offset)) {
            warn!(song, offset, error = %source, "failed to seek index offset");
            return Err(LibraryError::io(index_path, source));
        }

        let mut raw = Vec::new();
        reader
            .read_until(b'\n', &mut raw)
            .map_err(|source| LibraryError::io(index_path, source))?;
        String::from_utf8_lossy(&raw).trim().to_string()
    };

    if line.is_empty() {
        return Err(LibraryError::EmptyEntry(song));
    }

    debug!(song, "path cache miss");
    state.cache.insert(song, line.clone());
    Ok(line)
}

/// Linear search of the whole catalog for `path`.
pub fn find_song_by_path<S: Storage>(
    storage: &S,
    state: &mut PlayerState,
    path: &str,
) -> Option<usize> {
    if path.is_empty() {
        return None;
    }
    (0..state.library.len())
        .find(|song| resolve_path(storage, state, *song).is_ok_and(|current| current == path))
}

/// Remove a file, or a directory and everything below it.
pub fn delete_path_recursive<S: Storage>(storage: &mut S, path: &str) -> Result<()> {
    let target = paths::normalize_dir(path);
    if path.trim().is_empty() || target == paths::ROOT {
        warn!(path = %path, "refusing to delete empty path or root");
        return Err(LibraryError::ProtectedPath(path.to_string()));
    }
    remove_tree(storage, &target)
}

fn remove_tree<S: Storage>(storage: &mut S, target: &str) -> Result<()> {
    if !storage.exists(target) {
        warn!(path = %target, "delete: path not found");
        return Err(LibraryError::io(
            target,
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    if !storage.is_dir(target) {
        return storage.remove_file(target).map_err(|source| {
            warn!(path = %target, error = %source, "delete: failed to remove file");
            LibraryError::io(target, source)
        });
    }

    let children = storage
        .list_dir(target)
        .map_err(|source| LibraryError::io(target, source))?;
    for child in children {
        remove_tree(storage, &paths::join(target, &child.name))?;
    }
    storage.remove_dir(target).map_err(|source| {
        warn!(path = %target, error = %source, "delete: failed to remove directory");
        LibraryError::io(target, source)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DirEntry, LocalStorage};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    /// Counts catalog opens so tests can tell cache hits from disk reads.
    struct CountingStorage {
        inner: LocalStorage,
        opens: Cell<usize>,
    }

    impl Storage for CountingStorage {
        type Reader = <LocalStorage as Storage>::Reader;
        type Writer = <LocalStorage as Storage>::Writer;

        fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
            self.opens.set(self.opens.get() + 1);
            self.inner.open_read(path)
        }
        fn create(&mut self, path: &str) -> io::Result<Self::Writer> {
            self.inner.create(path)
        }
        fn exists(&self, path: &str) -> bool {
            self.inner.exists(path)
        }
        fn is_dir(&self, path: &str) -> bool {
            self.inner.is_dir(path)
        }
        fn create_dir(&mut self, path: &str) -> io::Result<()> {
            self.inner.create_dir(path)
        }
        fn list_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
            self.inner.list_dir(path)
        }
        fn remove_file(&mut self, path: &str) -> io::Result<()> {
            self.inner.remove_file(path)
        }
        fn remove_dir(&mut self, path: &str) -> io::Result<()> {
            self.inner.remove_dir(path)
        }
    }

    fn card_with(files: &[&str]) -> (TempDir, LocalStorage) {
        let dir = tempdir().expect("tempdir");
        for file in files {
            let host = dir.path().join(file.trim_start_matches('/'));
            fs::create_dir_all(host.parent().expect("parent")).expect("mkdir");
            fs::write(host, b"x").expect("write");
        }
        let storage = LocalStorage::new(dir.path());
        (dir, storage)
    }

    fn catalog(root: &Path) -> String {
        fs::read_to_string(root.join(".library_index.txt")).expect("catalog")
    }

    #[test]
    fn rebuild_indexes_only_audio_files() {
        let (dir, mut storage) = card_with(&[
            "/music/a.mp3",
            "/music/b.WAV",
            "/music/cover.jpg",
            "/music/notes.txt",
        ]);
        let mut state = PlayerState::default();

        let count = rebuild_index(&mut storage, &mut state, "/music", 4).expect("rebuild");
        assert_eq!(count, 2);
        assert_eq!(catalog(dir.path()), "/music/a.mp3\n/music/b.WAV\n");
        assert_eq!(state.queue.songs(), &[0, 1]);
    }

    #[test]
    fn depth_zero_does_not_descend() {
        let (_dir, mut storage) = card_with(&["/music/top.mp3", "/music/album/deep.mp3"]);
        let mut state = PlayerState::default();

        assert_eq!(rebuild_index(&mut storage, &mut state, "/music", 0).expect("rebuild"), 1);
        assert_eq!(rebuild_index(&mut storage, &mut state, "/music", 1).expect("rebuild"), 2);
    }

    #[test]
    fn scan_stops_silently_at_capacity_in_encounter_order() {
        let (dir, mut storage) = card_with(&[
            "/music/1.mp3",
            "/music/2.mp3",
            "/music/3.mp3",
            "/music/4.mp3",
            "/music/5.mp3",
        ]);
        let mut state = PlayerState::new(EngineConfig {
            max_library_files: 3,
            ..EngineConfig::default()
        });

        let count = rebuild_index(&mut storage, &mut state, "/music", 2).expect("rebuild");
        assert_eq!(count, 3);
        assert_eq!(
            catalog(dir.path()),
            "/music/1.mp3\n/music/2.mp3\n/music/3.mp3\n"
        );
    }

    #[test]
    fn rebuild_creates_music_dir_and_replaces_catalog() {
        let (dir, mut storage) = card_with(&["/songs/a.mp3"]);
        fs::write(dir.path().join(".library_index.txt"), "/stale/old.mp3\n").expect("write");
        let mut state = PlayerState::default();

        rebuild_index(&mut storage, &mut state, "/songs", 2).expect("rebuild");
        assert!(dir.path().join("music").is_dir());
        assert_eq!(catalog(dir.path()), "/songs/a.mp3\n");
    }

    #[test]
    fn rebuild_of_empty_tree_reports_failure() {
        let (_dir, mut storage) = card_with(&["/music/readme.txt"]);
        let mut state = PlayerState::default();

        let err = rebuild_index(&mut storage, &mut state, "/music", 2).expect_err("empty");
        assert!(matches!(err, LibraryError::EmptyQueue { .. }));
        assert!(state.queue.is_empty());
        assert_eq!(state.queue.selected(), 0);
        assert_eq!(state.queue.playing(), 0);
    }

    #[test]
    fn blank_lines_record_no_song() {
        let (dir, storage) = card_with(&[]);
        fs::write(
            dir.path().join(".library_index.txt"),
            "\n/music/a.mp3\n  \n/music/b.mp3\n",
        )
        .expect("write");
        let mut state = PlayerState::default();

        assert_eq!(load_index(&storage, &mut state).expect("load"), 2);
        assert_eq!(state.library.offsets(), &[1, 17]);
        assert_eq!(resolve_path(&storage, &mut state, 1).expect("path"), "/music/b.mp3");
    }

    #[test]
    fn load_is_idempotent() {
        let (_dir, mut storage) = card_with(&["/music/a.mp3", "/music/x/b.mp3", "/music/c.wav"]);
        let mut state = PlayerState::default();
        rebuild_index(&mut storage, &mut state, "/music", 3).expect("rebuild");

        load_index(&storage, &mut state).expect("first load");
        let offsets = state.library.clone();
        let queue = state.queue.songs().to_vec();
        load_index(&storage, &mut state).expect("second load");

        assert_eq!(state.library, offsets);
        assert_eq!(state.queue.songs(), queue.as_slice());
    }

    #[test]
    fn load_without_catalog_is_io_error() {
        let (_dir, storage) = card_with(&[]);
        let mut state = PlayerState::default();
        let err = load_index(&storage, &mut state).expect_err("missing");
        assert!(matches!(err, LibraryError::Io { .. }));
    }

    #[test]
    fn load_truncates_long_catalog_at_capacity() {
        let (dir, storage) = card_with(&[]);
        fs::write(
            dir.path().join(".library_index.txt"),
            "/a.mp3\n/b.mp3\n/c.mp3\n",
        )
        .expect("write");
        let mut state = PlayerState::new(EngineConfig {
            max_library_files: 2,
            ..EngineConfig::default()
        });
        assert_eq!(load_index(&storage, &mut state).expect("load"), 2);
    }

    #[test]
    fn resolve_returns_catalog_line_from_disk_and_cache() {
        let (dir, mut storage) = card_with(&["/music/a.mp3", "/music/b.mp3", "/music/c/d.mp3"]);
        let mut state = PlayerState::default();
        rebuild_index(&mut storage, &mut state, "/music", 2).expect("rebuild");
        let lines: Vec<String> = catalog(dir.path()).lines().map(String::from).collect();

        for (song, expected) in lines.iter().enumerate() {
            assert_eq!(&resolve_path(&storage, &mut state, song).expect("disk"), expected);
            assert_eq!(&resolve_path(&storage, &mut state, song).expect("cache"), expected);
        }
    }

    #[test]
    fn resolve_rejects_out_of_range_ids() {
        let (_dir, mut storage) = card_with(&["/music/a.mp3"]);
        let mut state = PlayerState::default();
        rebuild_index(&mut storage, &mut state, "/music", 2).expect("rebuild");

        let err = resolve_path(&storage, &mut state, 1).expect_err("out of range");
        assert!(matches!(err, LibraryError::SongOutOfRange(1)));
    }

    #[test]
    fn cache_evicts_first_lookup_after_capacity_plus_one() {
        let (_dir, mut local) = card_with(&[
            "/music/1.mp3",
            "/music/2.mp3",
            "/music/3.mp3",
            "/music/4.mp3",
        ]);
        let mut state = PlayerState::new(EngineConfig {
            file_path_cache_size: 3,
            ..EngineConfig::default()
        });
        rebuild_index(&mut local, &mut state, "/music", 1).expect("rebuild");
        let storage = CountingStorage {
            inner: local,
            opens: Cell::new(0),
        };

        for song in 0..3 {
            resolve_path(&storage, &mut state, song).expect("resolve");
        }
        assert_eq!(storage.opens.get(), 3);
        resolve_path(&storage, &mut state, 0).expect("cached");
        assert_eq!(storage.opens.get(), 3);

        resolve_path(&storage, &mut state, 3).expect("fourth");
        assert_eq!(storage.opens.get(), 4);
        assert_eq!(resolve_path(&storage, &mut state, 0).expect("reread"), "/music/1.mp3");
        assert_eq!(storage.opens.get(), 5);
    }

    #[test]
    fn find_song_by_path_scans_catalog() {
        let (_dir, mut storage) = card_with(&["/music/a.mp3", "/music/b.mp3"]);
        let mut state = PlayerState::default();
        rebuild_index(&mut storage, &mut state, "/music", 1).expect("rebuild");

        assert_eq!(find_song_by_path(&storage, &mut state, "/music/b.mp3"), Some(1));
        assert_eq!(find_song_by_path(&storage, &mut state, "/music/z.mp3"), None);
        assert_eq!(find_song_by_path(&storage, &mut state, ""), None);
    }

    #[test]
    fn delete_path_recursive_removes_tree() {
        let (dir, mut storage) = card_with(&["/music/album/a.mp3", "/music/album/cd2/b.mp3"]);
        delete_path_recursive(&mut storage, "/music/album").expect("delete");
        assert!(!dir.path().join("music").join("album").exists());
        assert!(dir.path().join("music").is_dir());
    }

    #[test]
    fn delete_path_recursive_refuses_root() {
        let (_dir, mut storage) = card_with(&["/music/a.mp3"]);
        assert!(matches!(
            delete_path_recursive(&mut storage, "/"),
            Err(LibraryError::ProtectedPath(_))
        ));
        assert!(matches!(
            delete_path_recursive(&mut storage, "  "),
            Err(LibraryError::ProtectedPath(_))
        ));
        assert!(matches!(
            delete_path_recursive(&mut storage, "/music/../.."),
            Err(LibraryError::ProtectedPath(_))
        ));
        assert!(storage.exists("/music/a.mp3"));
    }
}
