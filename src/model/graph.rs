use serde::{Deserialize, Serialize};

use crate::model::{
    Arena, Detector, DetectorSettings, Handle, Image, ImagingEnvironment, Instrument,
    LightSettings, LightSource, LogicalChannel, Lsid, ObjectKind, Objective, ObjectiveSettings,
    Otf, Pixels, PlaneInfo, Plate, Registry, Screen,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageNode {
    pub lsid: Lsid,
    pub data: Image,
    pub pixels: Vec<Handle<PixelsNode>>,
    pub instrument: Option<Handle<InstrumentNode>>,
    pub environment: Option<Handle<EnvironmentNode>>,
    pub objective_settings: Option<Handle<ObjectiveSettingsNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelsNode {
    pub lsid: Lsid,
    pub data: Pixels,
    pub image: Handle<ImageNode>,
    pub channels: Vec<Handle<ChannelNode>>,
    pub plane_infos: Vec<Handle<PlaneInfoNode>>,
}

/// Wrapper created by the assembler around each logical channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelNode {
    pub pixels: Handle<PixelsNode>,
    pub logical_channel: Handle<LogicalChannelNode>,
    pub stats: Option<StatsInfo>,
}

/// Global intensity range computed by the statistics collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsInfo {
    pub global_min: f64,
    pub global_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalChannelNode {
    pub lsid: Lsid,
    pub data: LogicalChannel,
    pub otf: Option<Handle<OtfNode>>,
    pub detector_settings: Option<Handle<DetectorSettingsNode>>,
    pub light_settings: Option<Handle<LightSettingsNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneInfoNode {
    pub lsid: Lsid,
    pub data: PlaneInfo,
    pub pixels: Handle<PixelsNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentNode {
    pub lsid: Lsid,
    pub data: Instrument,
    pub objectives: Vec<Handle<ObjectiveNode>>,
    pub detectors: Vec<Handle<DetectorNode>>,
    pub light_sources: Vec<Handle<LightSourceNode>>,
    pub otfs: Vec<Handle<OtfNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveNode {
    pub lsid: Lsid,
    pub data: Objective,
    pub instrument: Handle<InstrumentNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorNode {
    pub lsid: Lsid,
    pub data: Detector,
    pub instrument: Handle<InstrumentNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSourceNode {
    pub lsid: Lsid,
    pub data: LightSource,
    pub instrument: Handle<InstrumentNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtfNode {
    pub lsid: Lsid,
    pub data: Otf,
    pub instrument: Handle<InstrumentNode>,
    pub objective: Option<Handle<ObjectiveNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentNode {
    pub lsid: Lsid,
    pub data: ImagingEnvironment,
    pub image: Handle<ImageNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettingsNode {
    pub lsid: Lsid,
    pub data: DetectorSettings,
    pub logical_channel: Handle<LogicalChannelNode>,
    pub detector: Option<Handle<DetectorNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSettingsNode {
    pub lsid: Lsid,
    pub data: LightSettings,
    pub logical_channel: Handle<LogicalChannelNode>,
    pub light_source: Option<Handle<LightSourceNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSettingsNode {
    pub lsid: Lsid,
    pub data: ObjectiveSettings,
    pub image: Handle<ImageNode>,
    pub objective: Option<Handle<ObjectiveNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateNode {
    pub lsid: Lsid,
    pub data: Plate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenNode {
    pub lsid: Lsid,
    pub data: Screen,
}

/// Handle to any registered object, tagged by node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Image(Handle<ImageNode>),
    Pixels(Handle<PixelsNode>),
    LogicalChannel(Handle<LogicalChannelNode>),
    PlaneInfo(Handle<PlaneInfoNode>),
    Instrument(Handle<InstrumentNode>),
    Objective(Handle<ObjectiveNode>),
    Detector(Handle<DetectorNode>),
    LightSource(Handle<LightSourceNode>),
    Otf(Handle<OtfNode>),
    ImagingEnvironment(Handle<EnvironmentNode>),
    DetectorSettings(Handle<DetectorSettingsNode>),
    LightSettings(Handle<LightSettingsNode>),
    ObjectiveSettings(Handle<ObjectiveSettingsNode>),
    Plate(Handle<PlateNode>),
    Screen(Handle<ScreenNode>),
}

/// The assembled hierarchy: typed arenas plus the ordered top-level registries.
///
/// The image registry is the canonical root handed to persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectGraph {
    pub images: Arena<ImageNode>,
    pub pixels: Arena<PixelsNode>,
    pub channels: Arena<ChannelNode>,
    pub logical_channels: Arena<LogicalChannelNode>,
    pub plane_infos: Arena<PlaneInfoNode>,
    pub instruments: Arena<InstrumentNode>,
    pub objectives: Arena<ObjectiveNode>,
    pub detectors: Arena<DetectorNode>,
    pub light_sources: Arena<LightSourceNode>,
    pub otfs: Arena<OtfNode>,
    pub environments: Arena<EnvironmentNode>,
    pub detector_settings: Arena<DetectorSettingsNode>,
    pub light_settings: Arena<LightSettingsNode>,
    pub objective_settings: Arena<ObjectiveSettingsNode>,
    pub plates: Arena<PlateNode>,
    pub screens: Arena<ScreenNode>,

    pub image_registry: Registry<ImageNode>,
    pub instrument_registry: Registry<InstrumentNode>,
    pub plate_registry: Registry<PlateNode>,
    pub screen_registry: Registry<ScreenNode>,
    /// Every pixel set in the order it was first attached
    pub pixels_registry: Registry<PixelsNode>,
}

impl ObjectGraph {
    pub fn image(&self, position: usize) -> Option<&ImageNode> {
        self.image_registry.get(position).map(|h| &self.images[h])
    }

    pub fn instrument(&self, position: usize) -> Option<&InstrumentNode> {
        self.instrument_registry
            .get(position)
            .map(|h| &self.instruments[h])
    }

    pub fn plate(&self, position: usize) -> Option<&PlateNode> {
        self.plate_registry.get(position).map(|h| &self.plates[h])
    }

    pub fn screen(&self, position: usize) -> Option<&ScreenNode> {
        self.screen_registry.get(position).map(|h| &self.screens[h])
    }

    /// `Image[image].PixelSet[pixels]`
    pub fn pixels_of(&self, image: usize, pixels: usize) -> Option<&PixelsNode> {
        let node = self.image(image)?;
        node.pixels.get(pixels).map(|h| &self.pixels[*h])
    }

    /// `Image[image].PixelSet[0].Channel[channel]`
    pub fn channel_of(&self, image: usize, channel: usize) -> Option<&ChannelNode> {
        let pixels = self.pixels_of(image, 0)?;
        pixels.channels.get(channel).map(|h| &self.channels[*h])
    }

    pub fn logical_channel_of(&self, image: usize, channel: usize) -> Option<&LogicalChannelNode> {
        self.channel_of(image, channel)
            .map(|c| &self.logical_channels[c.logical_channel])
    }

    pub fn pixels_in_access_order(&self) -> impl Iterator<Item = &PixelsNode> {
        self.pixels_registry
            .handles()
            .iter()
            .map(move |h| &self.pixels[*h])
    }

    /// Concrete kind of the referenced node
    pub fn kind_of(&self, object: ObjectRef) -> ObjectKind {
        match object {
            ObjectRef::Image(_) => ObjectKind::Image,
            ObjectRef::Pixels(_) => ObjectKind::Pixels,
            ObjectRef::LogicalChannel(_) => ObjectKind::LogicalChannel,
            ObjectRef::PlaneInfo(_) => ObjectKind::PlaneInfo,
            ObjectRef::Instrument(_) => ObjectKind::Instrument,
            ObjectRef::Objective(_) => ObjectKind::Objective,
            ObjectRef::Detector(_) => ObjectKind::Detector,
            ObjectRef::LightSource(h) => self.light_sources[h].data.kind(),
            ObjectRef::Otf(_) => ObjectKind::Otf,
            ObjectRef::ImagingEnvironment(_) => ObjectKind::ImagingEnvironment,
            ObjectRef::DetectorSettings(_) => ObjectKind::DetectorSettings,
            ObjectRef::LightSettings(_) => ObjectKind::LightSettings,
            ObjectRef::ObjectiveSettings(_) => ObjectKind::ObjectiveSettings,
            ObjectRef::Plate(_) => ObjectKind::Plate,
            ObjectRef::Screen(_) => ObjectKind::Screen,
        }
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            images: self.image_registry.len(),
            pixels: self.pixels_registry.len(),
            channels: self.channels.len(),
            plane_infos: self.plane_infos.len(),
            instruments: self.instrument_registry.len(),
            plates: self.plate_registry.len(),
            screens: self.screen_registry.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub images: usize,
    pub pixels: usize,
    pub channels: usize,
    pub plane_infos: usize,
    pub instruments: usize,
    pub plates: usize,
    pub screens: usize,
}

impl std::fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} images, {} pixel sets, {} channels, {} plane infos, {} instruments, {} plates, {} screens",
            self.images,
            self.pixels,
            self.channels,
            self.plane_infos,
            self.instruments,
            self.plates,
            self.screens
        )
    }
}

/// Finished graph handed to persistence after a session completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledGraph {
    pub session_id: String,
    pub graph: ObjectGraph,
}

impl AssembledGraph {
    /// Ordered image list, the root of the persisted record
    pub fn root(&self) -> impl Iterator<Item = &ImageNode> {
        self.graph
            .image_registry
            .handles()
            .iter()
            .map(move |h| &self.graph.images[*h])
    }
}
