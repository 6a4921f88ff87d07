//! Metadata graph assembler for image imports.
//!
//! A format reader streams `(identifier, object, indices)` updates into an
//! [`ImportSession`], then hands over one table of symbolic cross-references.
//! The session attaches every object by kind, links the references, and
//! hands the finished graph to a [`GraphStore`].

pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use error::{AssemblyError, IndexSlot, Phase, Result};

pub use logic::{
    parse_event_log, replay, IdentifierEntry, IdentifierTable, ImportSession, MinMaxAccumulator,
    ReferenceTable, ReplayReport,
};

// Export all model types
pub use model::*;

pub use store::{FileGraphStore, GraphStore, InMemoryGraphStore};

/// Replay an event log into a fresh session and persist the result.
/// Returns the snapshot hash.
pub async fn import_event_log<S: GraphStore>(
    json: &str,
    store: &S,
    compress: bool,
) -> anyhow::Result<(String, GraphSummary)> {
    let events = parse_event_log(json)?;
    let mut session = ImportSession::new();
    replay(&mut session, events)?;

    let assembled = session.finish();
    let summary = assembled.graph.summary();
    let snapshot = GraphSnapshot::with_compression(&assembled, compress)?;
    let hash = snapshot.hash.clone();
    store.save_snapshot(snapshot).await?;
    Ok((hash, summary))
}
