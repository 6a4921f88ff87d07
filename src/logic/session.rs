use log::info;

use crate::error::{AssemblyError, Phase, Result};
use crate::logic::IdentifierTable;
use crate::model::{generate_session_id, AssembledGraph, ImageNode, ObjectGraph};

/// State for one import: the graph under construction, the identifier
/// table and the populate-then-link phase.
///
/// A session is single-writer. Concurrent imports each need their own
/// `ImportSession`; the registries and identifier table are not meant to
/// be shared, and nothing here takes a lock.
#[derive(Debug)]
pub struct ImportSession {
    pub(crate) session_id: String,
    pub(crate) started_at: chrono::DateTime<chrono::Utc>,
    pub(crate) graph: ObjectGraph,
    pub(crate) identifiers: IdentifierTable,
    pub(crate) phase: Phase,
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportSession {
    pub fn new() -> Self {
        Self::with_session_id(generate_session_id())
    }

    pub fn with_session_id(session_id: String) -> Self {
        Self {
            session_id,
            started_at: chrono::Utc::now(),
            graph: ObjectGraph::default(),
            identifiers: IdentifierTable::new(),
            phase: Phase::Populating,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn identifiers(&self) -> &IdentifierTable {
        &self.identifiers
    }

    /// Current root list: the ordered images
    pub fn get_root(&self) -> Vec<&ImageNode> {
        self.graph
            .image_registry
            .handles()
            .iter()
            .map(|h| &self.graph.images[*h])
            .collect()
    }

    /// Drop everything and start a new session on this instance.
    ///
    /// Handles issued before the reset are stale afterwards.
    pub fn reset(&mut self) {
        info!(
            "Resetting import session {} ({})",
            self.session_id,
            self.graph.summary()
        );
        *self = Self::new();
    }

    /// Consume the session and hand the finished graph to persistence.
    ///
    /// Accepted in either phase; a graph that was never linked simply has
    /// no cross-references.
    pub fn finish(self) -> AssembledGraph {
        info!(
            "Session {} finished in phase {}: {}",
            self.session_id,
            self.phase,
            self.graph.summary()
        );
        AssembledGraph {
            session_id: self.session_id,
            graph: self.graph,
        }
    }

    pub(crate) fn require_phase(&self, allowed: &[Phase], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(AssemblyError::phase(operation, self.phase))
        }
    }
}
