use std::fmt;

use thiserror::Error;

use crate::model::{ArenaFull, Lsid, ObjectKind};

/// Result type alias used throughout the assembler
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// A caller-supplied index slot that failed to resolve.
///
/// `position` is `None` when the index key was absent from the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSlot {
    pub name: String,
    pub position: Option<usize>,
    /// Number of entries in the target registry when the lookup failed
    pub len: usize,
}

impl IndexSlot {
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            position: None,
            len: 0,
        }
    }

    pub fn out_of_range(name: &str, position: usize, len: usize) -> Self {
        Self {
            name: name.to_string(),
            position: Some(position),
            len,
        }
    }
}

impl fmt::Display for IndexSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(
                f,
                "{}={} outside registry of {} entries",
                self.name, position, self.len
            ),
            None => write!(f, "required index '{}' was not supplied", self.name),
        }
    }
}

/// Import session phase, used to report barrier violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Populating,
    Linked,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Populating => write!(f, "populating"),
            Phase::Linked => write!(f, "linked"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("unsupported object kind '{kind}' for identifier '{id}'")]
    UnsupportedObjectKind { id: Lsid, kind: String },

    #[error("dangling index reference from '{id}' ({kind}): {slot}")]
    DanglingIndexReference {
        id: Lsid,
        kind: ObjectKind,
        slot: IndexSlot,
    },

    #[error("unresolved identifier '{missing}' in reference pair ('{target_id}' -> '{reference_id}')")]
    UnresolvedIdentifier {
        target_id: Lsid,
        reference_id: Lsid,
        missing: Lsid,
    },

    #[error(
        "no linking rule for '{target_id}' ({target_kind}) -> '{reference_id}' ({reference_kind})"
    )]
    UnsupportedReferenceKindPair {
        target_id: Lsid,
        target_kind: ObjectKind,
        reference_id: Lsid,
        reference_kind: ObjectKind,
    },

    #[error("identifier must not be empty (object kind {kind})")]
    EmptyIdentifier { kind: String },

    #[error("{operation} is not allowed while the session is {phase}")]
    PhaseViolation {
        operation: &'static str,
        phase: Phase,
    },

    #[error("malformed {kind} payload for '{id}': {source}")]
    MalformedPayload {
        id: Lsid,
        kind: ObjectKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot store '{id}' ({kind}): {source}")]
    CapacityExceeded {
        id: Lsid,
        kind: ObjectKind,
        #[source]
        source: ArenaFull,
    },

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssemblyError {
    pub fn dangling(id: &str, kind: ObjectKind, slot: IndexSlot) -> Self {
        Self::DanglingIndexReference {
            id: id.to_string(),
            kind,
            slot,
        }
    }

    pub fn capacity(id: &str, kind: ObjectKind, source: ArenaFull) -> Self {
        Self::CapacityExceeded {
            id: id.to_string(),
            kind,
            source,
        }
    }

    pub fn phase(operation: &'static str, phase: Phase) -> Self {
        Self::PhaseViolation { operation, phase }
    }

    /// Whether the error means the reader broke the import contract and the
    /// partially built graph must be discarded.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedObjectKind { .. }
                | Self::DanglingIndexReference { .. }
                | Self::UnresolvedIdentifier { .. }
                | Self::UnsupportedReferenceKindPair { .. }
                | Self::EmptyIdentifier { .. }
                | Self::MalformedPayload { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_message_names_slot() {
        let err = AssemblyError::dangling(
            "urn:lsid:Pixels:0",
            ObjectKind::Pixels,
            IndexSlot::out_of_range("imageIndex", 3, 1),
        );
        let msg = err.to_string();
        assert!(msg.contains("urn:lsid:Pixels:0"));
        assert!(msg.contains("imageIndex=3"));
        assert!(msg.contains("1 entries"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_missing_index_message() {
        let err = AssemblyError::dangling(
            "p0",
            ObjectKind::PlaneInfo,
            IndexSlot::missing("pixelsIndex"),
        );
        assert!(err.to_string().contains("'pixelsIndex' was not supplied"));
    }

    #[test]
    fn test_kind_pair_message_reports_both_kinds() {
        let err = AssemblyError::UnsupportedReferenceKindPair {
            target_id: "img".to_string(),
            target_kind: ObjectKind::Image,
            reference_id: "det".to_string(),
            reference_kind: ObjectKind::Detector,
        };
        let msg = err.to_string();
        assert!(msg.contains("'img' (Image)"));
        assert!(msg.contains("'det' (Detector)"));
    }

    #[test]
    fn test_phase_violation_is_not_contract_violation() {
        let err = AssemblyError::phase("update_object", Phase::Linked);
        assert_eq!(
            err.to_string(),
            "update_object is not allowed while the session is linked"
        );
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_capacity_error_names_object() {
        let err = AssemblyError::capacity("pl-9", ObjectKind::PlaneInfo, ArenaFull { len: 7 });
        assert_eq!(
            err.to_string(),
            "cannot store 'pl-9' (PlaneInfo): arena is full at 7 entries"
        );
        assert!(!err.is_contract_violation());
    }
}
