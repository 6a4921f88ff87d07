use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Typed, stable reference into an [`Arena`].
///
/// Arenas are append-only, so a handle stays valid for the life of the
/// graph that issued it. Handles from a graph that has been reset are stale.
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

/// An arena already holds `u32::MAX + 1` entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("arena is full at {len} entries")]
pub struct ArenaFull {
    pub len: usize,
}

impl<T> Handle<T> {
    fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    fn at_position(position: usize) -> Result<Self, ArenaFull> {
        u32::try_from(position)
            .map(Self::new)
            .map_err(|_| ArenaFull { len: position })
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl<T> Serialize for Handle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.index)
    }
}

impl<'de, T> Deserialize<'de> for Handle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::new(u32::deserialize(deserializer)?))
    }
}

/// Append-only storage for one entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    /// Store `value`; nothing is stored when the arena is full
    pub fn alloc(&mut self, value: T) -> Result<Handle<T>, ArenaFull> {
        let handle = Handle::at_position(self.items.len())?;
        self.items.push(value);
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.index()]
    }
}

/// Ordered, position-addressable list of handles (Image list, Instrument list, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry<T> {
    entries: Vec<Handle<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    /// Append and return the new position
    pub fn append(&mut self, handle: Handle<T>) -> usize {
        self.entries.push(handle);
        self.entries.len() - 1
    }

    pub fn get(&self, position: usize) -> Option<Handle<T>> {
        self.entries.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> &[Handle<T>] {
        &self.entries
    }
}
