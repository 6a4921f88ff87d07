use log::{debug, warn};

use crate::error::{AssemblyError, IndexSlot, Phase, Result};
use crate::logic::ImportSession;
use crate::model::{
    ChannelNode, DetectorNode, DetectorSettingsNode, EnvironmentNode, Handle, ImageNode, Indices,
    InstrumentNode, LightSettingsNode, LightSourceNode, LogicalChannelNode, MetadataObject,
    ObjectKind, ObjectRef, ObjectiveNode, ObjectiveSettingsNode, OtfNode, PixelsNode,
    PlaneInfoNode, PlateNode, RawObject, ScreenNode, IMAGE_INDEX, INSTRUMENT_INDEX,
    LOGICAL_CHANNEL_INDEX, PIXELS_INDEX,
};

impl ImportSession {
    /// Register one object and attach it to the graph according to its kind.
    ///
    /// Indices are resolved before anything is allocated, so a failed call
    /// leaves the registries and the identifier table untouched. On success
    /// the identifier maps to the new object, replacing any earlier entry.
    pub fn update_object(
        &mut self,
        id: &str,
        object: MetadataObject,
        indices: &Indices,
    ) -> Result<ObjectRef> {
        self.require_phase(&[Phase::Populating], "update_object")?;
        let kind = object.kind();
        if id.is_empty() {
            return Err(AssemblyError::EmptyIdentifier {
                kind: kind.to_string(),
            });
        }
        let lsid = id.to_string();
        let full = |source| AssemblyError::capacity(id, kind, source);

        let object_ref = match object {
            MetadataObject::Image(data) => {
                let handle = self
                    .graph
                    .images
                    .alloc(ImageNode {
                        lsid,
                        data,
                        pixels: Vec::new(),
                        instrument: None,
                        environment: None,
                        objective_settings: None,
                    })
                    .map_err(full)?;
                let position = self.graph.image_registry.append(handle);
                debug!("Image '{}' registered as imageIndex={}", id, position);
                ObjectRef::Image(handle)
            }
            MetadataObject::Pixels(data) => {
                let image = self.image_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .pixels
                    .alloc(PixelsNode {
                        lsid,
                        data,
                        image,
                        channels: Vec::new(),
                        plane_infos: Vec::new(),
                    })
                    .map_err(full)?;
                self.graph.images[image].pixels.push(handle);
                self.graph.pixels_registry.append(handle);
                debug!("Pixels '{}' attached to image #{}", id, image.index());
                ObjectRef::Pixels(handle)
            }
            MetadataObject::LogicalChannel(data) => {
                let image = self.image_at(id, kind, indices)?;
                let pixels = self.pixels_at(id, kind, image, 0)?;
                let logical_channel = self
                    .graph
                    .logical_channels
                    .alloc(LogicalChannelNode {
                        lsid,
                        data,
                        otf: None,
                        detector_settings: None,
                        light_settings: None,
                    })
                    .map_err(full)?;
                let channel = self
                    .graph
                    .channels
                    .alloc(ChannelNode {
                        pixels,
                        logical_channel,
                        stats: None,
                    })
                    .map_err(full)?;
                let channels = &mut self.graph.pixels[pixels].channels;
                channels.push(channel);
                debug!(
                    "LogicalChannel '{}' wrapped as channel {} of pixels #{}",
                    id,
                    channels.len() - 1,
                    pixels.index()
                );
                ObjectRef::LogicalChannel(logical_channel)
            }
            MetadataObject::PlaneInfo(data) => {
                let image = self.image_at(id, kind, indices)?;
                let position = required_index(id, kind, indices, PIXELS_INDEX)?;
                let pixels = self.pixels_at(id, kind, image, position)?;
                let handle = self
                    .graph
                    .plane_infos
                    .alloc(PlaneInfoNode { lsid, data, pixels })
                    .map_err(full)?;
                self.graph.pixels[pixels].plane_infos.push(handle);
                debug!("PlaneInfo '{}' attached to pixels #{}", id, pixels.index());
                ObjectRef::PlaneInfo(handle)
            }
            MetadataObject::Instrument(data) => {
                let handle = self
                    .graph
                    .instruments
                    .alloc(InstrumentNode {
                        lsid,
                        data,
                        objectives: Vec::new(),
                        detectors: Vec::new(),
                        light_sources: Vec::new(),
                        otfs: Vec::new(),
                    })
                    .map_err(full)?;
                let position = self.graph.instrument_registry.append(handle);
                debug!("Instrument '{}' registered as instrumentIndex={}", id, position);
                ObjectRef::Instrument(handle)
            }
            MetadataObject::Objective(data) => {
                let instrument = self.instrument_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .objectives
                    .alloc(ObjectiveNode {
                        lsid,
                        data,
                        instrument,
                    })
                    .map_err(full)?;
                self.graph.instruments[instrument].objectives.push(handle);
                debug!("Objective '{}' attached to instrument #{}", id, instrument.index());
                ObjectRef::Objective(handle)
            }
            MetadataObject::Detector(data) => {
                let instrument = self.instrument_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .detectors
                    .alloc(DetectorNode {
                        lsid,
                        data,
                        instrument,
                    })
                    .map_err(full)?;
                self.graph.instruments[instrument].detectors.push(handle);
                debug!("Detector '{}' attached to instrument #{}", id, instrument.index());
                ObjectRef::Detector(handle)
            }
            MetadataObject::LightSource(data) => {
                let instrument = self.instrument_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .light_sources
                    .alloc(LightSourceNode {
                        lsid,
                        data,
                        instrument,
                    })
                    .map_err(full)?;
                self.graph.instruments[instrument].light_sources.push(handle);
                debug!("{} '{}' attached to instrument #{}", kind, id, instrument.index());
                ObjectRef::LightSource(handle)
            }
            MetadataObject::Otf(data) => {
                let instrument = self.instrument_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .otfs
                    .alloc(OtfNode {
                        lsid,
                        data,
                        instrument,
                        objective: None,
                    })
                    .map_err(full)?;
                self.graph.instruments[instrument].otfs.push(handle);
                debug!("OTF '{}' attached to instrument #{}", id, instrument.index());
                ObjectRef::Otf(handle)
            }
            MetadataObject::ImagingEnvironment(data) => {
                let image = self.image_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .environments
                    .alloc(EnvironmentNode { lsid, data, image })
                    .map_err(full)?;
                if self.graph.images[image].environment.replace(handle).is_some() {
                    warn!("ImagingEnvironment '{}' replaced an earlier one on image #{}", id, image.index());
                } else {
                    debug!("ImagingEnvironment '{}' attached to image #{}", id, image.index());
                }
                ObjectRef::ImagingEnvironment(handle)
            }
            MetadataObject::DetectorSettings(data) => {
                let logical_channel = self.logical_channel_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .detector_settings
                    .alloc(DetectorSettingsNode {
                        lsid,
                        data,
                        logical_channel,
                        detector: None,
                    })
                    .map_err(full)?;
                if self.graph.logical_channels[logical_channel]
                    .detector_settings
                    .replace(handle)
                    .is_some()
                {
                    warn!("DetectorSettings '{}' replaced earlier settings on its logical channel", id);
                } else {
                    debug!(
                        "DetectorSettings '{}' attached to logical channel #{}",
                        id,
                        logical_channel.index()
                    );
                }
                ObjectRef::DetectorSettings(handle)
            }
            MetadataObject::LightSettings(data) => {
                let logical_channel = self.logical_channel_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .light_settings
                    .alloc(LightSettingsNode {
                        lsid,
                        data,
                        logical_channel,
                        light_source: None,
                    })
                    .map_err(full)?;
                if self.graph.logical_channels[logical_channel]
                    .light_settings
                    .replace(handle)
                    .is_some()
                {
                    warn!("LightSettings '{}' replaced earlier settings on its logical channel", id);
                } else {
                    debug!(
                        "LightSettings '{}' attached to logical channel #{}",
                        id,
                        logical_channel.index()
                    );
                }
                ObjectRef::LightSettings(handle)
            }
            MetadataObject::ObjectiveSettings(data) => {
                let image = self.image_at(id, kind, indices)?;
                let handle = self
                    .graph
                    .objective_settings
                    .alloc(ObjectiveSettingsNode {
                        lsid,
                        data,
                        image,
                        objective: None,
                    })
                    .map_err(full)?;
                if self.graph.images[image]
                    .objective_settings
                    .replace(handle)
                    .is_some()
                {
                    warn!("ObjectiveSettings '{}' replaced earlier settings on image #{}", id, image.index());
                } else {
                    debug!("ObjectiveSettings '{}' attached to image #{}", id, image.index());
                }
                ObjectRef::ObjectiveSettings(handle)
            }
            MetadataObject::Plate(data) => {
                let handle = self
                    .graph
                    .plates
                    .alloc(PlateNode { lsid, data })
                    .map_err(full)?;
                let position = self.graph.plate_registry.append(handle);
                debug!("Plate '{}' registered at position {}", id, position);
                ObjectRef::Plate(handle)
            }
            MetadataObject::Screen(data) => {
                let handle = self
                    .graph
                    .screens
                    .alloc(ScreenNode { lsid, data })
                    .map_err(full)?;
                let position = self.graph.screen_registry.append(handle);
                debug!("Screen '{}' registered at position {}", id, position);
                ObjectRef::Screen(handle)
            }
        };

        if let Some(previous) = self.identifiers.put(id, object_ref, kind) {
            warn!(
                "Identifier '{}' re-registered: {} replaced by {}; attached children stay where they are",
                id, previous.kind, kind
            );
        }
        Ok(object_ref)
    }

    /// Decode a reader payload by its kind string, then [`update_object`](Self::update_object).
    pub fn update_raw(&mut self, id: &str, raw: RawObject, indices: &Indices) -> Result<ObjectRef> {
        self.require_phase(&[Phase::Populating], "update_object")?;
        let object = MetadataObject::from_raw(id, raw)?;
        self.update_object(id, object, indices)
    }

    fn image_at(&self, id: &str, kind: ObjectKind, indices: &Indices) -> Result<Handle<ImageNode>> {
        let position = required_index(id, kind, indices, IMAGE_INDEX)?;
        let registry = &self.graph.image_registry;
        registry.get(position).ok_or_else(|| {
            AssemblyError::dangling(
                id,
                kind,
                IndexSlot::out_of_range(IMAGE_INDEX, position, registry.len()),
            )
        })
    }

    fn instrument_at(
        &self,
        id: &str,
        kind: ObjectKind,
        indices: &Indices,
    ) -> Result<Handle<InstrumentNode>> {
        let position = required_index(id, kind, indices, INSTRUMENT_INDEX)?;
        let registry = &self.graph.instrument_registry;
        registry.get(position).ok_or_else(|| {
            AssemblyError::dangling(
                id,
                kind,
                IndexSlot::out_of_range(INSTRUMENT_INDEX, position, registry.len()),
            )
        })
    }

    fn pixels_at(
        &self,
        id: &str,
        kind: ObjectKind,
        image: Handle<ImageNode>,
        position: usize,
    ) -> Result<Handle<PixelsNode>> {
        let pixels = &self.graph.images[image].pixels;
        pixels.get(position).copied().ok_or_else(|| {
            AssemblyError::dangling(
                id,
                kind,
                IndexSlot::out_of_range(PIXELS_INDEX, position, pixels.len()),
            )
        })
    }

    /// `Image[imageIndex].PixelSet[0].Channel[logicalChannelIndex].LogicalChannel`
    fn logical_channel_at(
        &self,
        id: &str,
        kind: ObjectKind,
        indices: &Indices,
    ) -> Result<Handle<LogicalChannelNode>> {
        let image = self.image_at(id, kind, indices)?;
        let position = required_index(id, kind, indices, LOGICAL_CHANNEL_INDEX)?;
        let pixels = self.pixels_at(id, kind, image, 0)?;
        let channels = &self.graph.pixels[pixels].channels;
        let channel = channels.get(position).copied().ok_or_else(|| {
            AssemblyError::dangling(
                id,
                kind,
                IndexSlot::out_of_range(LOGICAL_CHANNEL_INDEX, position, channels.len()),
            )
        })?;
        Ok(self.graph.channels[channel].logical_channel)
    }
}

fn required_index(id: &str, kind: ObjectKind, indices: &Indices, name: &str) -> Result<usize> {
    indices
        .get(name)
        .ok_or_else(|| AssemblyError::dangling(id, kind, IndexSlot::missing(name)))
}
