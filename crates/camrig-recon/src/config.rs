use std::path::Path;

use camrig_3d::glyph::GlyphScales;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// Configuration of the rig normalization and display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Image width in pixels, used to move the principal point to the top-left origin.
    pub image_width: u32,
    /// Image height in pixels, used to move the principal point to the top-left origin.
    pub image_height: u32,
    /// Side of the camera frustum glyph in millimeters.
    pub frustum_scale: f64,
    /// Length of the camera axis arrows in millimeters.
    pub axis_scale: f64,
    /// Height of the camera label text in millimeters.
    pub label_scale: f64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            image_width: 1984,
            image_height: 1984,
            frustum_scale: 250.0,
            axis_scale: 200.0,
            label_scale: 100.0,
        }
    }
}

impl RigConfig {
    /// Load a configuration from a JSON file; absent fields take their default.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReconError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Half the image size, the shift from a centered to a top-left pixel origin.
    pub fn principal_point_shift(&self) -> [f64; 2] {
        [
            self.image_width as f64 / 2.0,
            self.image_height as f64 / 2.0,
        ]
    }

    /// The glyph sizes of this configuration.
    pub fn glyph_scales(&self) -> GlyphScales {
        GlyphScales {
            frustum: self.frustum_scale,
            axis: self.axis_scale,
            label: self.label_scale,
        }
    }
}
