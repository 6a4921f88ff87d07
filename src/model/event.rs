use serde::{Deserialize, Serialize};

use crate::model::{Indices, Lsid, RawObject};

/// One record of a reader's event log.
///
/// Logs are JSON arrays such as
/// `[{"op": "update", "id": "urn:lsid:Image:0", "object": {"kind": "Image"}}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImportEvent {
    Update {
        id: Lsid,
        object: RawObject,
        #[serde(default)]
        indices: Indices,
    },
    References {
        references: Vec<ReferencePair>,
    },
    ChannelStats {
        image_index: usize,
        channel_index: usize,
        min: f64,
        max: f64,
    },
}

/// (target, reference) identifier pair resolved after population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePair {
    pub target: Lsid,
    pub reference: Lsid,
}

impl ReferencePair {
    pub fn new(target: &str, reference: &str) -> Self {
        Self {
            target: target.to_string(),
            reference: reference.to_string(),
        }
    }
}
