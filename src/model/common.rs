use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Symbolic identifier (LSID) naming one logical object for one import session
pub type Lsid = String;

pub const IMAGE_INDEX: &str = "imageIndex";
pub const PIXELS_INDEX: &str = "pixelsIndex";
pub const INSTRUMENT_INDEX: &str = "instrumentIndex";
pub const LOGICAL_CHANNEL_INDEX: &str = "logicalChannelIndex";
pub const CHANNEL_INDEX: &str = "channelIndex";

/// Positional hints supplied by the reader alongside each update,
/// e.g. `{"imageIndex": 0, "pixelsIndex": 0}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Indices(BTreeMap<String, usize>);

impl Indices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, position: usize) -> Self {
        self.0.insert(name.to_string(), position);
        self
    }

    pub fn insert(&mut self, name: &str, position: usize) {
        self.0.insert(name.to_string(), position);
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, usize)> for Indices {
    fn from_iter<I: IntoIterator<Item = (&'a str, usize)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, position)| (name.to_string(), position))
                .collect(),
        )
    }
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
