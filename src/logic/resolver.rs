use itertools::Itertools;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

use crate::error::{AssemblyError, Phase, Result};
use crate::logic::ImportSession;
use crate::model::{
    DetectorNode, DetectorSettingsNode, Handle, ImageNode, InstrumentNode, LightSettingsNode,
    LightSourceNode, LogicalChannelNode, Lsid, ObjectRef, ObjectiveNode, ObjectiveSettingsNode,
    OtfNode, ReferencePair,
};

/// Target identifier -> reference identifiers.
///
/// A target may carry several references (an image pointing at an
/// instrument, a logical channel at an OTF, ...). Targets iterate in
/// sorted order, references in insertion order, duplicates collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    entries: BTreeMap<Lsid, Vec<Lsid>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: &str, reference: &str) {
        let references = self.entries.entry(target.to_string()).or_default();
        if !references.iter().any(|r| r == reference) {
            references.push(reference.to_string());
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(target, references)| {
            references
                .iter()
                .map(move |reference| (target.as_str(), reference.as_str()))
        })
    }

    /// Number of (target, reference) pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ReferencePair> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = ReferencePair>>(iter: I) -> Self {
        let mut table = Self::new();
        for pair in iter {
            table.insert(&pair.target, &pair.reference);
        }
        table
    }
}

/// One reference per target, the shape most readers emit
impl From<HashMap<Lsid, Lsid>> for ReferenceTable {
    fn from(map: HashMap<Lsid, Lsid>) -> Self {
        let mut table = Self::new();
        for (target, reference) in &map {
            table.insert(target, reference);
        }
        table
    }
}

/// A checked link, ready to be written into the graph
#[derive(Debug, Clone, Copy)]
enum Link {
    DetectorSettingsToDetector(Handle<DetectorSettingsNode>, Handle<DetectorNode>),
    ImageToInstrument(Handle<ImageNode>, Handle<InstrumentNode>),
    LightSettingsToLightSource(Handle<LightSettingsNode>, Handle<LightSourceNode>),
    LogicalChannelToOtf(Handle<LogicalChannelNode>, Handle<OtfNode>),
    OtfToObjective(Handle<OtfNode>, Handle<ObjectiveNode>),
    ObjectiveSettingsToObjective(Handle<ObjectiveSettingsNode>, Handle<ObjectiveNode>),
}

impl Link {
    fn name(&self) -> &'static str {
        match self {
            Link::DetectorSettingsToDetector(..) => "DetectorSettings->Detector",
            Link::ImageToInstrument(..) => "Image->Instrument",
            Link::LightSettingsToLightSource(..) => "LightSettings->LightSource",
            Link::LogicalChannelToOtf(..) => "LogicalChannel->OTF",
            Link::OtfToObjective(..) => "OTF->Objective",
            Link::ObjectiveSettingsToObjective(..) => "ObjectiveSettings->Objective",
        }
    }
}

impl ImportSession {
    /// Resolve symbolic references and link the graph.
    ///
    /// The first call seals population: later `update_object` calls fail.
    /// Every pair is looked up and kind-checked before any link is written,
    /// so a failing table leaves the graph exactly as it was. Linking is
    /// plain assignment, so resolving the same table again is a no-op.
    pub fn update_references(&mut self, references: &ReferenceTable) -> Result<usize> {
        self.require_phase(&[Phase::Populating, Phase::Linked], "update_references")?;
        if self.phase == Phase::Populating {
            info!(
                "Session {} population sealed with {} identifiers ({})",
                self.session_id,
                self.identifiers.len(),
                self.graph.summary()
            );
            self.phase = Phase::Linked;
        }

        let links = references
            .pairs()
            .map(|(target, reference)| self.plan_link(target, reference))
            .collect::<Result<Vec<_>>>()?;

        for link in &links {
            self.apply_link(*link);
        }

        let counts = links.iter().map(Link::name).counts();
        info!(
            "Session {} resolved {} references [{}]",
            self.session_id,
            links.len(),
            counts
                .iter()
                .sorted()
                .map(|(name, count)| format!("{}: {}", name, count))
                .join(", ")
        );
        Ok(links.len())
    }

    fn plan_link(&self, target_id: &str, reference_id: &str) -> Result<Link> {
        let unresolved = |missing: &str| AssemblyError::UnresolvedIdentifier {
            target_id: target_id.to_string(),
            reference_id: reference_id.to_string(),
            missing: missing.to_string(),
        };
        let target = self
            .identifiers
            .get(target_id)
            .ok_or_else(|| unresolved(target_id))?;
        let reference = self
            .identifiers
            .get(reference_id)
            .ok_or_else(|| unresolved(reference_id))?;

        match (target.object, reference.object) {
            (ObjectRef::DetectorSettings(settings), ObjectRef::Detector(detector)) => {
                Ok(Link::DetectorSettingsToDetector(settings, detector))
            }
            (ObjectRef::Image(image), ObjectRef::Instrument(instrument)) => {
                Ok(Link::ImageToInstrument(image, instrument))
            }
            (ObjectRef::LightSettings(settings), ObjectRef::LightSource(source)) => {
                Ok(Link::LightSettingsToLightSource(settings, source))
            }
            (ObjectRef::LogicalChannel(channel), ObjectRef::Otf(otf)) => {
                Ok(Link::LogicalChannelToOtf(channel, otf))
            }
            (ObjectRef::Otf(otf), ObjectRef::Objective(objective)) => {
                Ok(Link::OtfToObjective(otf, objective))
            }
            (ObjectRef::ObjectiveSettings(settings), ObjectRef::Objective(objective)) => {
                Ok(Link::ObjectiveSettingsToObjective(settings, objective))
            }
            _ => Err(AssemblyError::UnsupportedReferenceKindPair {
                target_id: target_id.to_string(),
                target_kind: target.kind,
                reference_id: reference_id.to_string(),
                reference_kind: reference.kind,
            }),
        }
    }

    fn apply_link(&mut self, link: Link) {
        let graph = &mut self.graph;
        match link {
            Link::DetectorSettingsToDetector(settings, detector) => {
                graph.detector_settings[settings].detector = Some(detector);
            }
            Link::ImageToInstrument(image, instrument) => {
                graph.images[image].instrument = Some(instrument);
            }
            Link::LightSettingsToLightSource(settings, source) => {
                graph.light_settings[settings].light_source = Some(source);
            }
            Link::LogicalChannelToOtf(channel, otf) => {
                graph.logical_channels[channel].otf = Some(otf);
            }
            Link::OtfToObjective(otf, objective) => {
                graph.otfs[otf].objective = Some(objective);
            }
            Link::ObjectiveSettingsToObjective(settings, objective) => {
                graph.objective_settings[settings].objective = Some(objective);
            }
        }
        debug!("Linked {}", link.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Detector, DetectorSettings, Image, Indices, Instrument, LightSettings, LightSource,
        LightSourceVariant, Laser, LogicalChannel, MetadataObject, ObjectKind, Objective,
        ObjectiveSettings, Otf, Pixels, IMAGE_INDEX, INSTRUMENT_INDEX, LOGICAL_CHANNEL_INDEX,
    };

    /// One image with one channel, one instrument with one of every device
    fn populated_session() -> ImportSession {
        let mut s = ImportSession::with_session_id("resolver-test".to_string());
        let none = Indices::new();
        let image = Indices::new().with(IMAGE_INDEX, 0);
        let instrument = Indices::new().with(INSTRUMENT_INDEX, 0);
        let channel = image.clone().with(LOGICAL_CHANNEL_INDEX, 0);

        s.update_object("img", MetadataObject::Image(Image::default()), &none).unwrap();
        s.update_object("pix", MetadataObject::Pixels(Pixels::default()), &image).unwrap();
        s.update_object("lc", MetadataObject::LogicalChannel(LogicalChannel::default()), &image)
            .unwrap();
        s.update_object("inst", MetadataObject::Instrument(Instrument::default()), &none)
            .unwrap();
        s.update_object("obj", MetadataObject::Objective(Objective::default()), &instrument)
            .unwrap();
        s.update_object("det", MetadataObject::Detector(Detector::default()), &instrument)
            .unwrap();
        s.update_object(
            "laser",
            MetadataObject::LightSource(LightSource {
                manufacturer: None,
                model: None,
                serial_number: None,
                power: None,
                variant: LightSourceVariant::Laser(Laser::default()),
            }),
            &instrument,
        )
        .unwrap();
        s.update_object("otf", MetadataObject::Otf(Otf::default()), &instrument).unwrap();
        s.update_object(
            "ds",
            MetadataObject::DetectorSettings(DetectorSettings::default()),
            &channel,
        )
        .unwrap();
        s.update_object("ls", MetadataObject::LightSettings(LightSettings::default()), &channel)
            .unwrap();
        s.update_object(
            "os",
            MetadataObject::ObjectiveSettings(ObjectiveSettings::default()),
            &image,
        )
        .unwrap();
        s
    }

    fn table(pairs: &[(&str, &str)]) -> ReferenceTable {
        pairs
            .iter()
            .map(|(t, r)| ReferencePair::new(t, r))
            .collect()
    }

    #[test]
    fn test_every_linking_rule() {
        let mut s = populated_session();
        let linked = s
            .update_references(&table(&[
                ("ds", "det"),
                ("img", "inst"),
                ("ls", "laser"),
                ("lc", "otf"),
                ("otf", "obj"),
                ("os", "obj"),
            ]))
            .unwrap();
        assert_eq!(linked, 6);

        let g = s.graph();
        let image = g.image(0).unwrap();
        let instrument = g.instrument(0).unwrap();
        assert_eq!(image.instrument, g.instrument_registry.get(0));

        let lc = g.logical_channel_of(0, 0).unwrap();
        assert_eq!(lc.otf, Some(instrument.otfs[0]));
        let ds = &g.detector_settings[lc.detector_settings.unwrap()];
        assert_eq!(ds.detector, Some(instrument.detectors[0]));
        let ls = &g.light_settings[lc.light_settings.unwrap()];
        assert_eq!(ls.light_source, Some(instrument.light_sources[0]));
        assert_eq!(g.otfs[instrument.otfs[0]].objective, Some(instrument.objectives[0]));
        let os = &g.objective_settings[image.objective_settings.unwrap()];
        assert_eq!(os.objective, Some(instrument.objectives[0]));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut s = populated_session();
        let refs = table(&[("ds", "det"), ("img", "inst")]);
        s.update_references(&refs).unwrap();
        let once = s.graph().clone();
        s.update_references(&refs).unwrap();
        assert_eq!(s.graph(), &once);
    }

    #[test]
    fn test_unresolved_identifier_mutates_nothing() {
        let mut s = populated_session();
        let err = s
            .update_references(&table(&[("ds", "det"), ("img", "inst-missing")]))
            .unwrap_err();
        match err {
            AssemblyError::UnresolvedIdentifier {
                target_id,
                reference_id,
                missing,
            } => {
                assert_eq!(target_id, "img");
                assert_eq!(reference_id, "inst-missing");
                assert_eq!(missing, "inst-missing");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // "ds" sorts before "img" but its link must not have been written
        let lc = s.graph().logical_channel_of(0, 0).unwrap();
        let ds = &s.graph().detector_settings[lc.detector_settings.unwrap()];
        assert!(ds.detector.is_none());
    }

    #[test]
    fn test_unsupported_kind_pair_reports_both_sides() {
        let mut s = populated_session();
        let err = s.update_references(&table(&[("img", "det")])).unwrap_err();
        match err {
            AssemblyError::UnsupportedReferenceKindPair {
                target_id,
                target_kind,
                reference_id,
                reference_kind,
            } => {
                assert_eq!(target_id, "img");
                assert_eq!(target_kind, ObjectKind::Image);
                assert_eq!(reference_id, "det");
                assert_eq!(reference_kind, ObjectKind::Detector);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_multiple_references_per_target_are_all_linked() {
        let mut s = populated_session();
        s.update_object(
            "obj2",
            MetadataObject::Objective(Objective::default()),
            &Indices::new().with(INSTRUMENT_INDEX, 0),
        )
        .unwrap();

        let mut refs = ReferenceTable::new();
        refs.insert("otf", "obj");
        refs.insert("lc", "otf");
        refs.insert("otf", "obj2");
        refs.insert("otf", "obj");
        assert_eq!(refs.len(), 3);
        assert_eq!(s.update_references(&refs).unwrap(), 3);

        // assignment semantics: the last reference for a target wins
        let instrument = s.graph().instrument(0).unwrap();
        let otf = &s.graph().otfs[instrument.otfs[0]];
        assert_eq!(otf.objective, Some(instrument.objectives[1]));
        assert!(s.graph().logical_channel_of(0, 0).unwrap().otf.is_some());
    }

    #[test]
    fn test_update_after_resolution_is_rejected() {
        let mut s = populated_session();
        s.update_references(&ReferenceTable::new()).unwrap();
        assert_eq!(s.phase(), Phase::Linked);
        let err = s
            .update_object("img-late", MetadataObject::Image(Image::default()), &Indices::new())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::PhaseViolation {
                phase: Phase::Linked,
                ..
            }
        ));
    }

    #[test]
    fn test_table_from_single_reference_map() {
        let mut map = HashMap::new();
        map.insert("img".to_string(), "inst".to_string());
        map.insert("ds".to_string(), "det".to_string());
        let refs = ReferenceTable::from(map);
        let pairs: Vec<_> = refs.pairs().collect();
        assert_eq!(pairs, vec![("ds", "det"), ("img", "inst")]);
    }
}
