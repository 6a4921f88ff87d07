use log::{debug, info};

use crate::error::Result;
use crate::logic::{ImportSession, ReferenceTable};
use crate::model::ImportEvent;

/// What a replay fed into the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub updates: usize,
    pub references: usize,
    pub channel_stats: usize,
}

pub fn parse_event_log(json: &str) -> Result<Vec<ImportEvent>> {
    Ok(serde_json::from_str(json)?)
}

/// Drive one session from a reader event log, in log order.
///
/// Stops at the first error; the caller discards the session.
pub fn replay<I>(session: &mut ImportSession, events: I) -> Result<ReplayReport>
where
    I: IntoIterator<Item = ImportEvent>,
{
    let mut report = ReplayReport::default();
    for event in events {
        match event {
            ImportEvent::Update {
                id,
                object,
                indices,
            } => {
                session.update_raw(&id, object, &indices)?;
                report.updates += 1;
            }
            ImportEvent::References { references } => {
                let table: ReferenceTable = references.into_iter().collect();
                report.references += session.update_references(&table)?;
            }
            ImportEvent::ChannelStats {
                image_index,
                channel_index,
                min,
                max,
            } => {
                session.set_channel_global_min_max(channel_index, min, max, image_index)?;
                report.channel_stats += 1;
            }
        }
    }
    debug!("Replay report: {:?}", report);
    info!(
        "Replayed {} updates, {} references, {} channel ranges into session {}",
        report.updates,
        report.references,
        report.channel_stats,
        session.session_id()
    );
    Ok(report)
}
