use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::AssembledGraph;

/// Immutable, content-addressed record of one assembled import.
/// Holds the JSON of the graph, gzip-compressed unless compression was
/// turned off. The hash covers the uncompressed JSON either way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphSnapshot {
    /// SHA-256 hash of the snapshot content
    pub hash: String,
    pub session_id: String,
    /// When the snapshot was created
    pub created_at: String, // ISO 8601 string

    /// Graph JSON, gzip or plain
    pub data: Vec<u8>,
    /// Uncompressed size for monitoring
    pub data_size: i64,

    /// Metadata for quick access without decompressing
    pub images_count: i32,
    pub pixels_count: i32,
    pub instruments_count: i32,
}

impl GraphSnapshot {
    pub fn new(assembled: &AssembledGraph) -> Result<Self> {
        Self::with_compression(assembled, true)
    }

    pub fn with_compression(assembled: &AssembledGraph, compress: bool) -> Result<Self> {
        let serialized = serde_json::to_string(assembled)?;
        let hash = Self::calculate_hash(&assembled.session_id, &serialized);
        let summary = assembled.graph.summary();
        let data_size = serialized.len() as i64;
        let data = if compress {
            Self::compress_data(serialized.as_bytes())?
        } else {
            serialized.into_bytes()
        };

        Ok(Self {
            hash,
            session_id: assembled.session_id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            data,
            data_size,
            images_count: summary.images as i32,
            pixels_count: summary.pixels as i32,
            instruments_count: summary.instruments as i32,
        })
    }

    /// Calculate SHA-256 hash for the snapshot
    fn calculate_hash(session_id: &str, data: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(format!("session:{}\n", session_id));
        hasher.update(format!("data:{}\n", data));

        hex::encode(hasher.finalize())
    }

    fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress_data(data: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        // Plain JSON is passed through
        if is_gzip(data) {
            let mut decoder = GzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        } else {
            Ok(data.to_vec())
        }
    }

    pub fn is_compressed(&self) -> bool {
        is_gzip(&self.data)
    }

    /// Decompress and deserialize the assembled graph
    pub fn graph(&self) -> Result<AssembledGraph> {
        let decompressed = Self::decompress_data(&self.data)?;
        Ok(serde_json::from_slice(&decompressed)?)
    }

    /// Recompute the hash from the stored data
    pub fn verify(&self) -> Result<bool> {
        let decompressed = Self::decompress_data(&self.data)?;
        let json = String::from_utf8_lossy(&decompressed);
        Ok(Self::calculate_hash(&self.session_id, &json) == self.hash)
    }
}

/// Gzip magic bytes (1f 8b)
fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&[0x1f, 0x8b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Image, ImageNode, ObjectGraph};

    fn sample_graph() -> AssembledGraph {
        let mut graph = ObjectGraph::default();
        let image = graph
            .images
            .alloc(ImageNode {
                lsid: "img-0".to_string(),
                data: Image {
                    name: Some("sample".to_string()),
                    ..Default::default()
                },
                pixels: Vec::new(),
                instrument: None,
                environment: None,
                objective_settings: None,
            })
            .unwrap();
        graph.image_registry.append(image);
        AssembledGraph {
            session_id: "session-1".to_string(),
            graph,
        }
    }

    #[test]
    fn test_snapshot_compresses_and_restores_graph() {
        let assembled = sample_graph();
        let snapshot = GraphSnapshot::new(&assembled).unwrap();

        assert_eq!(&snapshot.data[..2], &[0x1f, 0x8b]);
        assert_eq!(snapshot.images_count, 1);
        assert_eq!(snapshot.hash.len(), 64);
        assert_eq!(snapshot.graph().unwrap(), assembled);
        assert!(snapshot.verify().unwrap());
    }

    #[test]
    fn test_uncompressed_snapshot_holds_plain_json() {
        let assembled = sample_graph();
        let plain = GraphSnapshot::with_compression(&assembled, false).unwrap();
        let gzip = GraphSnapshot::with_compression(&assembled, true).unwrap();

        assert!(!plain.is_compressed());
        assert!(gzip.is_compressed());
        assert_eq!(plain.data.first(), Some(&b'{'));
        assert_eq!(plain.data.len() as i64, plain.data_size);
        assert_eq!(plain.hash, gzip.hash);
        assert_eq!(plain.graph().unwrap(), assembled);
        assert!(plain.verify().unwrap());
    }

    #[test]
    fn test_hash_depends_on_content() {
        let a = GraphSnapshot::new(&sample_graph()).unwrap();
        let mut other = sample_graph();
        other.session_id = "session-2".to_string();
        let b = GraphSnapshot::new(&other).unwrap();
        assert_ne!(a.hash, b.hash);

        let again = GraphSnapshot::new(&sample_graph()).unwrap();
        assert_eq!(a.hash, again.hash);
    }

    #[test]
    fn test_tampered_data_fails_verification() {
        let mut snapshot = GraphSnapshot::new(&sample_graph()).unwrap();
        snapshot.hash = "0".repeat(64);
        assert!(!snapshot.verify().unwrap());
    }
}
