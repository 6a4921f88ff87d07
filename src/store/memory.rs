use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::GraphSnapshot;
use crate::store::traits::GraphStore;
use anyhow::Result;

/// Snapshot store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    snapshots: RwLock<HashMap<String, GraphSnapshot>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn save_snapshot(&self, snapshot: GraphSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .entry(snapshot.hash.clone())
            .or_insert(snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, hash: &str) -> Result<Option<GraphSnapshot>> {
        Ok(self.snapshots.read().get(hash).cloned())
    }

    async fn list_snapshots(&self) -> Result<Vec<String>> {
        let mut hashes: Vec<String> = self.snapshots.read().keys().cloned().collect();
        hashes.sort();
        Ok(hashes)
    }

    async fn snapshot_exists(&self, hash: &str) -> Result<bool> {
        Ok(self.snapshots.read().contains_key(hash))
    }
}
