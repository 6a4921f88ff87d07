use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::GraphSnapshot;
use crate::store::traits::GraphStore;

const META_SUFFIX: &str = ".meta.json";
const GZIP_SUFFIX: &str = ".json.gz";
const PLAIN_SUFFIX: &str = ".json";

/// Snapshot store backed by a directory.
///
/// Each snapshot is two files: `<hash>.json.gz` with the data bytes as they
/// are (`<hash>.json` when the snapshot is uncompressed) and a small
/// `<hash>.meta.json` with everything else. The meta file is written last;
/// a snapshot without one does not exist.
#[derive(Debug, Clone)]
pub struct FileGraphStore {
    directory: PathBuf,
}

/// Snapshot fields kept beside the data file
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMeta {
    hash: String,
    session_id: String,
    created_at: String,
    compressed: bool,
    data_size: i64,
    images_count: i32,
    pixels_count: i32,
    instruments_count: i32,
}

impl SnapshotMeta {
    fn of(snapshot: &GraphSnapshot) -> Self {
        Self {
            hash: snapshot.hash.clone(),
            session_id: snapshot.session_id.clone(),
            created_at: snapshot.created_at.clone(),
            compressed: snapshot.is_compressed(),
            data_size: snapshot.data_size,
            images_count: snapshot.images_count,
            pixels_count: snapshot.pixels_count,
            instruments_count: snapshot.instruments_count,
        }
    }

    fn into_snapshot(self, data: Vec<u8>) -> GraphSnapshot {
        GraphSnapshot {
            hash: self.hash,
            session_id: self.session_id,
            created_at: self.created_at,
            data,
            data_size: self.data_size,
            images_count: self.images_count,
            pixels_count: self.pixels_count,
            instruments_count: self.instruments_count,
        }
    }
}

impl FileGraphStore {
    /// Create the store, creating the directory if needed
    pub async fn new(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create snapshot directory {}", directory.display()))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn meta_path(&self, hash: &str) -> Result<PathBuf> {
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid snapshot hash '{}'", hash);
        }
        Ok(self.directory.join(format!("{}{}", hash, META_SUFFIX)))
    }

    fn data_path(&self, hash: &str, compressed: bool) -> PathBuf {
        let suffix = if compressed { GZIP_SUFFIX } else { PLAIN_SUFFIX };
        self.directory.join(format!("{}{}", hash, suffix))
    }
}

/// Write through a sibling temp file so readers never see a partial file
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", temp.display()))?;
    tokio::fs::rename(&temp, path)
        .await
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

#[async_trait::async_trait]
impl GraphStore for FileGraphStore {
    async fn save_snapshot(&self, snapshot: GraphSnapshot) -> Result<()> {
        if self.snapshot_exists(&snapshot.hash).await? {
            return Ok(());
        }
        let meta = SnapshotMeta::of(&snapshot);
        let data_path = self.data_path(&snapshot.hash, meta.compressed);
        write_atomic(&data_path, &snapshot.data).await?;

        let meta_path = self.meta_path(&snapshot.hash)?;
        let meta_bytes = serde_json::to_vec_pretty(&meta).context("Failed to encode snapshot meta")?;
        write_atomic(&meta_path, &meta_bytes).await?;

        info!("Snapshot {} written to {}", snapshot.hash, data_path.display());
        Ok(())
    }

    async fn get_snapshot(&self, hash: &str) -> Result<Option<GraphSnapshot>> {
        let meta_path = self.meta_path(hash)?;
        let meta_bytes = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read snapshot meta {}", meta_path.display()))
            }
        };
        let meta: SnapshotMeta = serde_json::from_slice(&meta_bytes)
            .with_context(|| format!("Failed to decode snapshot meta {}", meta_path.display()))?;

        let data_path = self.data_path(hash, meta.compressed);
        let data = tokio::fs::read(&data_path)
            .await
            .with_context(|| format!("Failed to read snapshot data {}", data_path.display()))?;
        Ok(Some(meta.into_snapshot(data)))
    }

    async fn list_snapshots(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .with_context(|| format!("Failed to list {}", self.directory.display()))?;
        let mut hashes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(hash) = name.to_string_lossy().strip_suffix(META_SUFFIX) {
                hashes.push(hash.to_string());
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    async fn snapshot_exists(&self, hash: &str) -> Result<bool> {
        let path = self.meta_path(hash)?;
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::ImportSession;
    use crate::model::{AssembledGraph, Image, Indices, MetadataObject};

    fn assembled() -> AssembledGraph {
        let mut session = ImportSession::new();
        session
            .update_object("img-0", MetadataObject::Image(Image::default()), &Indices::new())
            .unwrap();
        session.finish()
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::new(dir.path().join("snapshots")).await.unwrap();

        let assembled = assembled();
        let snapshot = GraphSnapshot::new(&assembled).unwrap();
        let hash = snapshot.hash.clone();

        store.save_snapshot(snapshot.clone()).await.unwrap();
        assert!(store.snapshot_exists(&hash).await.unwrap());
        assert_eq!(store.list_snapshots().await.unwrap(), vec![hash.clone()]);

        let loaded = store.get_snapshot(&hash).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.graph().unwrap(), assembled);
    }

    #[tokio::test]
    async fn test_data_file_is_raw_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::new(dir.path()).await.unwrap();
        let snapshot = GraphSnapshot::new(&assembled()).unwrap();
        store.save_snapshot(snapshot.clone()).await.unwrap();

        let on_disk = std::fs::read(dir.path().join(format!("{}.json.gz", snapshot.hash))).unwrap();
        assert_eq!(&on_disk[..2], &[0x1f, 0x8b]);
        assert_eq!(on_disk, snapshot.data);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_uncompressed_snapshot_is_plain_json_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::new(dir.path()).await.unwrap();
        let assembled = assembled();
        let snapshot = GraphSnapshot::with_compression(&assembled, false).unwrap();
        store.save_snapshot(snapshot.clone()).await.unwrap();

        let on_disk = std::fs::read(dir.path().join(format!("{}.json", snapshot.hash))).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&on_disk).unwrap();
        assert_eq!(value["session_id"], serde_json::json!(assembled.session_id));

        let loaded = store.get_snapshot(&snapshot.hash).await.unwrap().unwrap();
        assert_eq!(loaded.graph().unwrap(), assembled);
    }

    #[tokio::test]
    async fn test_torn_data_file_does_not_block_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::new(dir.path()).await.unwrap();
        let snapshot = GraphSnapshot::new(&assembled()).unwrap();

        // Data written, meta never landed
        let data_path = dir.path().join(format!("{}.json.gz", snapshot.hash));
        std::fs::write(&data_path, [0x1f_u8]).unwrap();
        assert!(!store.snapshot_exists(&snapshot.hash).await.unwrap());
        assert!(store.get_snapshot(&snapshot.hash).await.unwrap().is_none());

        store.save_snapshot(snapshot.clone()).await.unwrap();
        let loaded = store.get_snapshot(&snapshot.hash).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(loaded.verify().unwrap());
    }

    #[tokio::test]
    async fn test_missing_and_invalid_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::new(dir.path()).await.unwrap();
        assert!(store.get_snapshot("abcdef").await.unwrap().is_none());
        assert!(!store.snapshot_exists("abcdef").await.unwrap());
        assert!(store.get_snapshot("../etc/passwd").await.is_err());
        assert!(store.snapshot_exists("../etc/passwd").await.is_err());
    }
}
