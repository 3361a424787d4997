use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use xml::common::XmlVersion;
use xml::reader::{EventReader, XmlEvent as ReadEvent};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent as WriteEvent};

use super::parse_floats;
use crate::camera::RawCameraRecord;
use crate::linalg::{compose_rigid, invert_rigid, split_rigid};

/// Error types for the Metashape module.
#[derive(Debug, thiserror::Error)]
pub enum MetashapeError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Malformed XML document
    #[error("Malformed XML document")]
    XmlReadError(#[from] xml::reader::Error),

    /// Failed to emit the XML document
    #[error("Failed to write XML document")]
    XmlWriteError(#[from] xml::writer::Error),

    /// A required element is absent
    #[error("Missing element <{element}> in {context}")]
    MissingElement {
        /// Name of the absent element.
        element: &'static str,
        /// The element or camera that should contain it.
        context: String,
    },

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),
}

/// One `camera` element of a Metashape project.
#[derive(Debug, Clone, PartialEq)]
pub struct MetashapeCamera {
    /// The `id` attribute.
    pub camera_id: Option<String>,
    /// The `sensor_id` attribute.
    pub sensor_id: Option<String>,
    /// The `component_id` attribute.
    pub component_id: Option<String>,
    /// The `label` attribute.
    pub label: Option<String>,
    /// Camera-to-world transform, row-major.
    pub transform: [[f64; 4]; 4],
    /// Rotation covariance, when the project stores it.
    pub rotation_covariance: Option<[[f64; 3]; 3]>,
    /// Location covariance, when the project stores it.
    pub location_covariance: Option<[[f64; 3]; 3]>,
    /// Intrinsic of the referenced sensor, pixel origin at the image center.
    ///
    /// `None` when the project has no calibrated sensor with the referenced id.
    pub intrinsic: Option<[[f64; 3]; 3]>,
}

#[derive(Default)]
struct SensorBuilder {
    id: Option<String>,
    in_calibration: bool,
    has_calibration: bool,
    f: Option<f64>,
    cx: Option<f64>,
    cy: Option<f64>,
}

#[derive(Default)]
struct CameraBuilder {
    camera_id: Option<String>,
    sensor_id: Option<String>,
    component_id: Option<String>,
    label: Option<String>,
    transform: Option<[[f64; 4]; 4]>,
    rotation_covariance: Option<[[f64; 3]; 3]>,
    location_covariance: Option<[[f64; 3]; 3]>,
}

impl CameraBuilder {
    fn context(&self) -> String {
        format!("camera {}", self.camera_id.as_deref().unwrap_or("<no id>"))
    }
}

/// Build the intrinsic matrix of a Metashape `frame` calibration.
pub fn intrinsic_from_calibration(f: f64, cx: f64, cy: f64) -> [[f64; 3]; 3] {
    [[f, 0.0, cx], [0.0, f, cy], [0.0, 0.0, 1.0]]
}

/// Read the cameras of a Metashape project XML file.
///
/// # Arguments
///
/// * `path` - The path to the project file.
///
/// # Returns
///
/// The cameras in document order. Cameras referencing an unknown sensor are kept
/// with an unset intrinsic.
pub fn read_metashape_xml(path: impl AsRef<Path>) -> Result<Vec<MetashapeCamera>, MetashapeError> {
    let file = File::open(path)?;
    parse_metashape_xml(BufReader::new(file))
}

/// Parse the cameras of a Metashape project from any reader.
///
/// `sensor` and `camera` elements are collected at any depth, so cameras nested in
/// `group` elements are found too.
pub fn parse_metashape_xml<R: Read>(reader: R) -> Result<Vec<MetashapeCamera>, MetashapeError> {
    let parser = EventReader::new(reader);

    let mut sensors: HashMap<String, [[f64; 3]; 3]> = HashMap::new();
    let mut builders: Vec<CameraBuilder> = Vec::new();

    let mut sensor: Option<SensorBuilder> = None;
    let mut camera: Option<CameraBuilder> = None;
    let mut text = String::new();

    for event in parser {
        match event? {
            ReadEvent::StartElement {
                name, attributes, ..
            } => {
                text.clear();
                let attr = |key: &str| {
                    attributes
                        .iter()
                        .find(|a| a.name.local_name == key)
                        .map(|a| a.value.clone())
                };
                match name.local_name.as_str() {
                    "sensor" => {
                        sensor = Some(SensorBuilder {
                            id: attr("id"),
                            ..Default::default()
                        });
                    }
                    "calibration" => {
                        if let Some(s) = sensor.as_mut() {
                            // a sensor may hold several calibrations, the first one wins
                            s.in_calibration = !s.has_calibration;
                            s.has_calibration = true;
                        }
                    }
                    "camera" => {
                        camera = Some(CameraBuilder {
                            camera_id: attr("id"),
                            sensor_id: attr("sensor_id"),
                            component_id: attr("component_id"),
                            label: attr("label"),
                            ..Default::default()
                        });
                    }
                    _ => {}
                }
            }
            ReadEvent::Characters(chars) | ReadEvent::CData(chars) => text.push_str(&chars),
            ReadEvent::EndElement { name } => {
                let local_name = name.local_name.as_str();
                if let Some(s) = sensor.as_mut().filter(|s| s.in_calibration) {
                    match local_name {
                        "f" => s.f = Some(parse_scalar(&text, "f")?),
                        "cx" => s.cx = Some(parse_scalar(&text, "cx")?),
                        "cy" => s.cy = Some(parse_scalar(&text, "cy")?),
                        "calibration" => s.in_calibration = false,
                        _ => {}
                    }
                }
                if let Some(c) = camera.as_mut() {
                    match local_name {
                        "transform" => {
                            c.transform = Some(parse_matrix44(&text, &c.context())?);
                        }
                        "rotation_covariance" => {
                            c.rotation_covariance = Some(parse_matrix33(&text, &c.context())?);
                        }
                        "location_covariance" => {
                            c.location_covariance = Some(parse_matrix33(&text, &c.context())?);
                        }
                        _ => {}
                    }
                }
                match local_name {
                    "sensor" => {
                        if let Some(s) = sensor.take() {
                            finish_sensor(s, &mut sensors)?;
                        }
                    }
                    "camera" => {
                        if let Some(c) = camera.take() {
                            builders.push(c);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            _ => {}
        }
    }

    builders
        .into_iter()
        .map(|c| {
            let transform = c.transform.ok_or_else(|| MetashapeError::MissingElement {
                element: "transform",
                context: c.context(),
            })?;
            let intrinsic = c
                .sensor_id
                .as_ref()
                .and_then(|id| sensors.get(id))
                .copied();
            if intrinsic.is_none() {
                log::warn!(
                    "{} references unknown sensor {:?}",
                    c.context(),
                    c.sensor_id
                );
            }
            Ok(MetashapeCamera {
                camera_id: c.camera_id,
                sensor_id: c.sensor_id,
                component_id: c.component_id,
                label: c.label,
                transform,
                rotation_covariance: c.rotation_covariance,
                location_covariance: c.location_covariance,
                intrinsic,
            })
        })
        .collect()
}

fn finish_sensor(
    s: SensorBuilder,
    sensors: &mut HashMap<String, [[f64; 3]; 3]>,
) -> Result<(), MetashapeError> {
    let context = format!("sensor {}", s.id.as_deref().unwrap_or("<no id>"));
    if !s.has_calibration {
        log::debug!("Skipping {context} without calibration");
        return Ok(());
    }
    let f = s.f.ok_or_else(|| MetashapeError::MissingElement {
        element: "f",
        context: context.clone(),
    })?;
    let cx = s.cx.ok_or_else(|| MetashapeError::MissingElement {
        element: "cx",
        context: context.clone(),
    })?;
    let cy = s.cy.ok_or_else(|| MetashapeError::MissingElement {
        element: "cy",
        context: context.clone(),
    })?;
    let intrinsic = intrinsic_from_calibration(f, cx, cy);
    match s.id {
        Some(id) => {
            sensors.insert(id, intrinsic);
        }
        None => log::warn!("Skipping calibrated sensor without id"),
    }
    Ok(())
}

fn parse_scalar(text: &str, element: &str) -> Result<f64, MetashapeError> {
    text.trim()
        .parse::<f64>()
        .map_err(|e| MetashapeError::ParseError(format!("<{element}> {text:?}: {e}")))
}

fn parse_values<const N: usize>(text: &str, context: &str) -> Result<[f64; N], MetashapeError> {
    let values = parse_floats(text)
        .map_err(|e| MetashapeError::ParseError(format!("{context}: {text:?}: {e}")))?;
    let count = values.len();
    values.try_into().map_err(|_| {
        MetashapeError::ParseError(format!("{context}: expected {N} values, found {count}"))
    })
}

fn parse_matrix44(text: &str, context: &str) -> Result<[[f64; 4]; 4], MetashapeError> {
    let values: [f64; 16] = parse_values(text, context)?;
    let mut out = [[0.0; 4]; 4];
    for (row, chunk) in out.iter_mut().zip(values.chunks_exact(4)) {
        row.copy_from_slice(chunk);
    }
    Ok(out)
}

fn parse_matrix33(text: &str, context: &str) -> Result<[[f64; 3]; 3], MetashapeError> {
    let values: [f64; 9] = parse_values(text, context)?;
    let mut out = [[0.0; 3]; 3];
    for (row, chunk) in out.iter_mut().zip(values.chunks_exact(3)) {
        row.copy_from_slice(chunk);
    }
    Ok(out)
}

/// Write cameras as a Metashape project XML file.
///
/// Each camera gets its own sensor. The principal point is moved from the top-left
/// pixel origin to the image center and the stored world-to-camera extrinsic is
/// inverted into the camera-to-world transform Metashape expects. Translations are
/// written in the units of the input.
///
/// # Arguments
///
/// * `path` - The path of the file to create.
/// * `cameras` - Intrinsics and world-to-camera extrinsics, MVS convention.
/// * `image_size` - The image (width, height) in pixels.
pub fn write_metashape_xml(
    path: impl AsRef<Path>,
    cameras: &[RawCameraRecord],
    image_size: (u32, u32),
) -> Result<(), MetashapeError> {
    let file = File::create(path)?;
    let mut writer = EmitterConfig::new()
        .perform_indent(true)
        .create_writer(BufWriter::new(file));
    emit_project(&mut writer, cameras, image_size)?;
    writer.into_inner().flush()?;
    Ok(())
}

fn emit_project<W: Write>(
    writer: &mut EventWriter<W>,
    cameras: &[RawCameraRecord],
    image_size: (u32, u32),
) -> Result<(), MetashapeError> {
    let (width, height) = image_size;
    let width_str = width.to_string();
    let height_str = height.to_string();
    let next_id = cameras.len().to_string();

    writer.write(WriteEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("utf-8"),
        standalone: None,
    })?;
    writer.write(WriteEvent::start_element("document").attr("version", "2.0.0"))?;
    writer.write(
        WriteEvent::start_element("chunk")
            .attr("label", "Chunk 1")
            .attr("enabled", "true"),
    )?;

    writer.write(WriteEvent::start_element("sensors").attr("next_id", &next_id))?;
    for (idx, record) in cameras.iter().enumerate() {
        let id = idx.to_string();
        let intrinsic = &record.intrinsic;
        writer.write(
            WriteEvent::start_element("sensor")
                .attr("id", &id)
                .attr("label", "unknown")
                .attr("type", "frame"),
        )?;
        writer.write(
            WriteEvent::start_element("resolution")
                .attr("width", &width_str)
                .attr("height", &height_str),
        )?;
        writer.write(WriteEvent::end_element())?;
        writer.write(
            WriteEvent::start_element("property")
                .attr("name", "layer_index")
                .attr("value", "0"),
        )?;
        writer.write(WriteEvent::end_element())?;
        writer.write(WriteEvent::start_element("bands"))?;
        for band in ["Red", "Green", "Blue"] {
            writer.write(WriteEvent::start_element("band").attr("label", band))?;
            writer.write(WriteEvent::end_element())?;
        }
        writer.write(WriteEvent::end_element())?;
        write_text_element(writer, "data_type", "float32")?;
        writer.write(
            WriteEvent::start_element("calibration")
                .attr("type", "frame")
                .attr("class", "adjusted"),
        )?;
        writer.write(
            WriteEvent::start_element("resolution")
                .attr("width", &width_str)
                .attr("height", &height_str),
        )?;
        writer.write(WriteEvent::end_element())?;
        write_text_element(writer, "f", &intrinsic[0][0].to_string())?;
        // Metashape puts the pixel origin at the image center
        write_text_element(
            writer,
            "cx",
            &(intrinsic[0][2] - width as f64 / 2.0).to_string(),
        )?;
        write_text_element(
            writer,
            "cy",
            &(intrinsic[1][2] - height as f64 / 2.0).to_string(),
        )?;
        writer.write(WriteEvent::end_element())?; // calibration
        writer.write(WriteEvent::end_element())?; // sensor
    }
    writer.write(WriteEvent::end_element())?; // sensors

    writer.write(
        WriteEvent::start_element("cameras")
            .attr("next_id", &next_id)
            .attr("next_group_id", "0"),
    )?;
    for (idx, record) in cameras.iter().enumerate() {
        let id = idx.to_string();
        let label = format!("{idx:08}");
        writer.write(
            WriteEvent::start_element("camera")
                .attr("id", &id)
                .attr("sensor_id", &id)
                .attr("component_id", "0")
                .attr("label", &label),
        )?;
        let (rotation, translation) = split_rigid(&record.extrinsic);
        let (c2w_rotation, c2w_translation) = invert_rigid(&rotation, &translation);
        let mut transform = compose_rigid(&c2w_rotation, &c2w_translation);
        transform[3] = record.extrinsic[3];
        let transform_text = transform
            .iter()
            .flatten()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        write_text_element(writer, "transform", &transform_text)?;
        writer.write(WriteEvent::end_element())?; // camera
    }
    writer.write(WriteEvent::end_element())?; // cameras

    // the consuming tool expects a component listing every camera
    writer.write(
        WriteEvent::start_element("components")
            .attr("next_id", "1")
            .attr("active_id", "0"),
    )?;
    writer.write(
        WriteEvent::start_element("component")
            .attr("id", "0")
            .attr("label", "Component 1"),
    )?;
    writer.write(WriteEvent::start_element("partition"))?;
    let camera_ids = (0..cameras.len())
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    write_text_element(writer, "camera_ids", &camera_ids)?;
    writer.write(WriteEvent::end_element())?; // partition
    writer.write(WriteEvent::end_element())?; // component
    writer.write(WriteEvent::end_element())?; // components

    writer.write(WriteEvent::end_element())?; // chunk
    writer.write(WriteEvent::end_element())?; // document
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut EventWriter<W>,
    name: &str,
    text: &str,
) -> Result<(), MetashapeError> {
    writer.write(WriteEvent::start_element(name))?;
    writer.write(WriteEvent::characters(text))?;
    writer.write(WriteEvent::end_element())?;
    Ok(())
}
