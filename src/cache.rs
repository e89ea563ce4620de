//! Fixed-capacity song id → path cache.
//!
//! Eviction is strictly by insertion order: every insert lands in the slot
//! under the write cursor and advances it, regardless of how often the
//! overwritten entry was read.

#[derive(Debug, Clone)]
pub struct PathCache {
    slots: Vec<Option<(usize, String)>>,
    write_pos: usize,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Cached path for `song`, if present and non-empty.
    pub fn get(&self, song: usize) -> Option<&str> {
        self.slots
            .iter()
            .flatten()
            .find(|(id, _)| *id == song)
            .map(|(_, path)| path.as_str())
            .filter(|path| !path.is_empty())
    }

    pub fn insert(&mut self, song: usize, path: String) {
        let slot = self.write_pos % self.slots.len();
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some((song, path));
        }
        self.write_pos = (slot + 1) % self.slots.len();
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.write_pos = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
