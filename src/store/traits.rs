use crate::model::GraphSnapshot;
use anyhow::Result;

/// Persistence collaborator for assembled graphs
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Persist a snapshot; saving the same hash twice is a no-op
    async fn save_snapshot(&self, snapshot: GraphSnapshot) -> Result<()>;
    /// Get a snapshot by its hash
    async fn get_snapshot(&self, hash: &str) -> Result<Option<GraphSnapshot>>;
    /// Hashes of every stored snapshot, sorted
    async fn list_snapshots(&self) -> Result<Vec<String>>;
    async fn snapshot_exists(&self, hash: &str) -> Result<bool>;
}
