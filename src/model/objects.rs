use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{AssemblyError, Result};

/// Unmodelled attributes, carried through to persistence unchanged
pub type Attributes = BTreeMap<String, Value>;

/// Closed taxonomy of object kinds the assembler knows how to attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Image,
    Pixels,
    LogicalChannel,
    PlaneInfo,
    Instrument,
    Objective,
    Detector,
    Laser,
    Filament,
    Arc,
    #[serde(rename = "OTF")]
    Otf,
    ImagingEnvironment,
    DetectorSettings,
    LightSettings,
    ObjectiveSettings,
    Plate,
    Screen,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Image => "Image",
            ObjectKind::Pixels => "Pixels",
            ObjectKind::LogicalChannel => "LogicalChannel",
            ObjectKind::PlaneInfo => "PlaneInfo",
            ObjectKind::Instrument => "Instrument",
            ObjectKind::Objective => "Objective",
            ObjectKind::Detector => "Detector",
            ObjectKind::Laser => "Laser",
            ObjectKind::Filament => "Filament",
            ObjectKind::Arc => "Arc",
            ObjectKind::Otf => "OTF",
            ObjectKind::ImagingEnvironment => "ImagingEnvironment",
            ObjectKind::DetectorSettings => "DetectorSettings",
            ObjectKind::LightSettings => "LightSettings",
            ObjectKind::ObjectiveSettings => "ObjectiveSettings",
            ObjectKind::Plate => "Plate",
            ObjectKind::Screen => "Screen",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Image" => Ok(ObjectKind::Image),
            "Pixels" => Ok(ObjectKind::Pixels),
            "LogicalChannel" => Ok(ObjectKind::LogicalChannel),
            "PlaneInfo" => Ok(ObjectKind::PlaneInfo),
            "Instrument" => Ok(ObjectKind::Instrument),
            "Objective" => Ok(ObjectKind::Objective),
            "Detector" => Ok(ObjectKind::Detector),
            "Laser" => Ok(ObjectKind::Laser),
            "Filament" => Ok(ObjectKind::Filament),
            "Arc" => Ok(ObjectKind::Arc),
            "OTF" => Ok(ObjectKind::Otf),
            "ImagingEnvironment" => Ok(ObjectKind::ImagingEnvironment),
            "DetectorSettings" => Ok(ObjectKind::DetectorSettings),
            "LightSettings" => Ok(ObjectKind::LightSettings),
            "ObjectiveSettings" => Ok(ObjectKind::ObjectiveSettings),
            "Plate" => Ok(ObjectKind::Plate),
            "Screen" => Ok(ObjectKind::Screen),
            _ => Err(format!("Unknown object kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: Option<String>,
    pub description: Option<String>,
    pub acquisition_date: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pixels {
    pub size_x: Option<u32>,
    pub size_y: Option<u32>,
    pub size_z: Option<u32>,
    pub size_c: Option<u32>,
    pub size_t: Option<u32>,
    pub pixel_type: Option<String>,
    pub dimension_order: Option<String>,
    pub physical_size_x: Option<f64>,
    pub physical_size_y: Option<f64>,
    pub physical_size_z: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalChannel {
    pub name: Option<String>,
    pub emission_wavelength: Option<f64>,
    pub excitation_wavelength: Option<f64>,
    pub fluor: Option<String>,
    pub illumination: Option<String>,
    pub contrast_method: Option<String>,
    pub samples_per_pixel: Option<u32>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneInfo {
    pub the_z: Option<u32>,
    pub the_c: Option<u32>,
    pub the_t: Option<u32>,
    pub delta_t: Option<f64>,
    pub exposure_time: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub microscope_model: Option<String>,
    pub microscope_manufacturer: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub nominal_magnification: Option<f64>,
    pub lens_na: Option<f64>,
    pub immersion: Option<String>,
    pub correction: Option<String>,
    pub working_distance: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detector {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "type")]
    pub detector_type: Option<String>,
    pub gain: Option<f64>,
    pub voltage: Option<f64>,
    pub offset: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// Light source; the concrete subtype lives in `variant`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSource {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub power: Option<f64>,
    pub variant: LightSourceVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LightSourceVariant {
    Laser(Laser),
    Filament(Filament),
    Arc(Arc),
}

impl LightSource {
    pub fn kind(&self) -> ObjectKind {
        match self.variant {
            LightSourceVariant::Laser(_) => ObjectKind::Laser,
            LightSourceVariant::Filament(_) => ObjectKind::Filament,
            LightSourceVariant::Arc(_) => ObjectKind::Arc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Laser {
    #[serde(rename = "type")]
    pub laser_type: Option<String>,
    pub laser_medium: Option<String>,
    pub wavelength: Option<f64>,
    pub frequency_multiplication: Option<u32>,
    pub tuneable: Option<bool>,
    pub pulse: Option<String>,
    pub pockel_cell: Option<bool>,
    pub repetition_rate: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filament {
    #[serde(rename = "type")]
    pub filament_type: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arc {
    #[serde(rename = "type")]
    pub arc_type: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

const LIGHT_SOURCE_HEADER_KEYS: [&str; 4] = ["manufacturer", "model", "serialNumber", "power"];

/// Light-source fields shared by every subtype, decoded ahead of the variant
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LightSourceHeader {
    manufacturer: Option<String>,
    model: Option<String>,
    serial_number: Option<String>,
    power: Option<f64>,
}

/// Optical transfer function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Otf {
    pub size_x: Option<u32>,
    pub size_y: Option<u32>,
    pub pixel_type: Option<String>,
    pub optical_axis_averaged: Option<bool>,
    pub path: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagingEnvironment {
    pub temperature: Option<f64>,
    pub air_pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub co2_percent: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSettings {
    pub gain: Option<f64>,
    pub offset: Option<f64>,
    pub voltage: Option<f64>,
    pub binning: Option<String>,
    pub read_out_rate: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSettings {
    pub attenuation: Option<f64>,
    pub wavelength: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveSettings {
    pub correction_collar: Option<f64>,
    pub medium: Option<String>,
    pub refractive_index: Option<f64>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub external_identifier: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub name: Option<String>,
    pub description: Option<String>,
    pub protocol_identifier: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// One update payload, tagged by its concrete kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataObject {
    Image(Image),
    Pixels(Pixels),
    LogicalChannel(LogicalChannel),
    PlaneInfo(PlaneInfo),
    Instrument(Instrument),
    Objective(Objective),
    Detector(Detector),
    LightSource(LightSource),
    Otf(Otf),
    ImagingEnvironment(ImagingEnvironment),
    DetectorSettings(DetectorSettings),
    LightSettings(LightSettings),
    ObjectiveSettings(ObjectiveSettings),
    Plate(Plate),
    Screen(Screen),
}

impl MetadataObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            MetadataObject::Image(_) => ObjectKind::Image,
            MetadataObject::Pixels(_) => ObjectKind::Pixels,
            MetadataObject::LogicalChannel(_) => ObjectKind::LogicalChannel,
            MetadataObject::PlaneInfo(_) => ObjectKind::PlaneInfo,
            MetadataObject::Instrument(_) => ObjectKind::Instrument,
            MetadataObject::Objective(_) => ObjectKind::Objective,
            MetadataObject::Detector(_) => ObjectKind::Detector,
            MetadataObject::LightSource(source) => source.kind(),
            MetadataObject::Otf(_) => ObjectKind::Otf,
            MetadataObject::ImagingEnvironment(_) => ObjectKind::ImagingEnvironment,
            MetadataObject::DetectorSettings(_) => ObjectKind::DetectorSettings,
            MetadataObject::LightSettings(_) => ObjectKind::LightSettings,
            MetadataObject::ObjectiveSettings(_) => ObjectKind::ObjectiveSettings,
            MetadataObject::Plate(_) => ObjectKind::Plate,
            MetadataObject::Screen(_) => ObjectKind::Screen,
        }
    }

    /// Decode a reader payload whose kind is only known as a string.
    ///
    /// Unknown kind strings fail with `UnsupportedObjectKind`; a known kind
    /// whose fields don't decode fails with `MalformedPayload`.
    pub fn from_raw(id: &str, raw: RawObject) -> Result<Self> {
        let kind: ObjectKind = raw
            .kind
            .parse()
            .map_err(|_| AssemblyError::UnsupportedObjectKind {
                id: id.to_string(),
                kind: raw.kind.clone(),
            })?;
        let value = Value::Object(raw.fields);
        let malformed = |source| AssemblyError::MalformedPayload {
            id: id.to_string(),
            kind,
            source,
        };

        let object = match kind {
            ObjectKind::Image => MetadataObject::Image(decode(value).map_err(malformed)?),
            ObjectKind::Pixels => MetadataObject::Pixels(decode(value).map_err(malformed)?),
            ObjectKind::LogicalChannel => {
                MetadataObject::LogicalChannel(decode(value).map_err(malformed)?)
            }
            ObjectKind::PlaneInfo => MetadataObject::PlaneInfo(decode(value).map_err(malformed)?),
            ObjectKind::Instrument => {
                MetadataObject::Instrument(decode(value).map_err(malformed)?)
            }
            ObjectKind::Objective => MetadataObject::Objective(decode(value).map_err(malformed)?),
            ObjectKind::Detector => MetadataObject::Detector(decode(value).map_err(malformed)?),
            ObjectKind::Laser | ObjectKind::Filament | ObjectKind::Arc => {
                let header: LightSourceHeader = decode(value.clone()).map_err(malformed)?;
                // Leftover keys become the subtype's attributes
                let mut value = value;
                if let Value::Object(fields) = &mut value {
                    for key in LIGHT_SOURCE_HEADER_KEYS {
                        fields.remove(key);
                    }
                }
                let variant = match kind {
                    ObjectKind::Laser => LightSourceVariant::Laser(decode(value).map_err(malformed)?),
                    ObjectKind::Filament => {
                        LightSourceVariant::Filament(decode(value).map_err(malformed)?)
                    }
                    _ => LightSourceVariant::Arc(decode(value).map_err(malformed)?),
                };
                MetadataObject::LightSource(LightSource {
                    manufacturer: header.manufacturer,
                    model: header.model,
                    serial_number: header.serial_number,
                    power: header.power,
                    variant,
                })
            }
            ObjectKind::Otf => MetadataObject::Otf(decode(value).map_err(malformed)?),
            ObjectKind::ImagingEnvironment => {
                MetadataObject::ImagingEnvironment(decode(value).map_err(malformed)?)
            }
            ObjectKind::DetectorSettings => {
                MetadataObject::DetectorSettings(decode(value).map_err(malformed)?)
            }
            ObjectKind::LightSettings => {
                MetadataObject::LightSettings(decode(value).map_err(malformed)?)
            }
            ObjectKind::ObjectiveSettings => {
                MetadataObject::ObjectiveSettings(decode(value).map_err(malformed)?)
            }
            ObjectKind::Plate => MetadataObject::Plate(decode(value).map_err(malformed)?),
            ObjectKind::Screen => MetadataObject::Screen(decode(value).map_err(malformed)?),
        };
        Ok(object)
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    serde_json::from_value(value)
}

/// Reader payload before kind dispatch: `{"kind": "Image", ...fields}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawObject {
    pub fn new(kind: &str, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.to_string(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = RawObject::new("Dichroic", json!({"model": "D1"}));
        let err = MetadataObject::from_raw("urn:lsid:Dichroic:0", raw).unwrap_err();
        match err {
            AssemblyError::UnsupportedObjectKind { id, kind } => {
                assert_eq!(id, "urn:lsid:Dichroic:0");
                assert_eq!(kind, "Dichroic");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_laser_payload_keeps_subtype_and_common_fields() {
        let raw = RawObject::new(
            "Laser",
            json!({"manufacturer": "Coherent", "power": 50.0, "wavelength": 488.0, "laserMedium": "Ar"}),
        );
        let object = MetadataObject::from_raw("laser-0", raw).unwrap();
        assert_eq!(object.kind(), ObjectKind::Laser);
        match object {
            MetadataObject::LightSource(source) => {
                assert_eq!(source.manufacturer.as_deref(), Some("Coherent"));
                assert_eq!(source.power, Some(50.0));
                match source.variant {
                    LightSourceVariant::Laser(laser) => {
                        assert_eq!(laser.wavelength, Some(488.0));
                        assert_eq!(laser.laser_medium.as_deref(), Some("Ar"));
                    }
                    other => panic!("expected laser, got {:?}", other),
                }
            }
            other => panic!("expected light source, got {:?}", other),
        }
    }

    #[test]
    fn test_unmodelled_attributes_are_carried_through() {
        let raw = RawObject::new("Image", json!({"name": "cells", "stageLabel": "A1"}));
        let object = MetadataObject::from_raw("img-0", raw).unwrap();
        let MetadataObject::Image(image) = object else {
            panic!("expected image");
        };
        assert_eq!(image.name.as_deref(), Some("cells"));
        assert_eq!(image.attributes.get("stageLabel"), Some(&json!("A1")));

        let back = serde_json::to_value(&image).unwrap();
        assert_eq!(back["stageLabel"], json!("A1"));
    }

    #[test]
    fn test_light_source_attributes_survive_encoding() {
        for (kind, fields) in [
            ("Laser", json!({"wavelength": 488.0, "power": 20.0, "lightSourceExtra": "keep-me"})),
            ("Filament", json!({"type": "Halogen", "lightSourceExtra": "keep-me"})),
        ] {
            let object = MetadataObject::from_raw("ls-0", RawObject::new(kind, fields)).unwrap();
            let MetadataObject::LightSource(source) = object else {
                panic!("expected light source for {}", kind);
            };
            let attributes = match &source.variant {
                LightSourceVariant::Laser(laser) => &laser.attributes,
                LightSourceVariant::Filament(filament) => &filament.attributes,
                LightSourceVariant::Arc(arc) => &arc.attributes,
            };
            assert_eq!(attributes.len(), 1, "{} attributes: {:?}", kind, attributes);
            assert_eq!(attributes.get("lightSourceExtra"), Some(&json!("keep-me")));

            let encoded = serde_json::to_value(&source).unwrap();
            let decoded: LightSource = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, source);
        }
    }

    #[test]
    fn test_malformed_payload_reports_kind() {
        let raw = RawObject::new("Pixels", json!({"sizeX": "wide"}));
        let err = MetadataObject::from_raw("pix-0", raw).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::MalformedPayload {
                kind: ObjectKind::Pixels,
                ..
            }
        ));
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [ObjectKind::Otf, ObjectKind::Filament, ObjectKind::ObjectiveSettings] {
            assert_eq!(kind.as_str().parse::<ObjectKind>().unwrap(), kind);
        }
        assert!("Channel".parse::<ObjectKind>().is_err());
    }
}
