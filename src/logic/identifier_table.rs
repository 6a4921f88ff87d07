use std::collections::HashMap;

use crate::model::{Lsid, ObjectKind, ObjectRef};

/// Entry for the most recent object registered under an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierEntry {
    pub object: ObjectRef,
    pub kind: ObjectKind,
}

/// Maps each identifier to the last object registered under it.
#[derive(Debug, Clone, Default)]
pub struct IdentifierTable {
    entries: HashMap<Lsid, IdentifierEntry>,
}

impl IdentifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert; returns the entry that was replaced, if any
    pub fn put(&mut self, id: &str, object: ObjectRef, kind: ObjectKind) -> Option<IdentifierEntry> {
        self.entries
            .insert(id.to_string(), IdentifierEntry { object, kind })
    }

    pub fn get(&self, id: &str) -> Option<IdentifierEntry> {
        self.entries.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Arena, Image, ImageNode};

    fn image_ref(arena: &mut Arena<ImageNode>, lsid: &str) -> ObjectRef {
        let handle = arena
            .alloc(ImageNode {
                lsid: lsid.to_string(),
                data: Image::default(),
                pixels: Vec::new(),
                instrument: None,
                environment: None,
                objective_settings: None,
            })
            .unwrap();
        ObjectRef::Image(handle)
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let mut arena = Arena::default();
        let mut table = IdentifierTable::new();
        let first = image_ref(&mut arena, "img");
        let second = image_ref(&mut arena, "img");

        assert!(table.put("img", first, ObjectKind::Image).is_none());
        let replaced = table.put("img", second, ObjectKind::Image).unwrap();
        assert_eq!(replaced.object, first);
        assert_eq!(table.get("img").unwrap().object, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_identifier() {
        let table = IdentifierTable::new();
        assert!(table.get("nope").is_none());
        assert!(!table.contains("nope"));
    }
}
