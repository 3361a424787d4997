use crate::{
    camera::CanonicalCameraSet,
    linalg::{self, LinalgError},
};

/// Sizes of the camera glyphs, in the units of the camera set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphScales {
    /// Side of the frustum base; the frustum height is 1.5 times this.
    pub frustum: f64,
    /// Length of the axis arrows.
    pub axis: f64,
    /// Height of the label text.
    pub label: f64,
}

/// Geometry of one camera marker, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraGlyph {
    /// The display label, `CAM01` for the first camera.
    pub label: String,
    /// The camera center.
    pub center: [f64; 3],
    /// The camera-to-world rotation.
    pub rotation: [[f64; 3]; 3],
    /// The x, y and z axis arrows, as vectors from the center.
    pub axes: [[f64; 3]; 3],
    /// The frustum vertices: the apex followed by the four base corners.
    pub frustum: [[f64; 3]; 5],
    /// Height of the label text.
    pub label_scale: f64,
}

impl CameraGlyph {
    /// The eight frustum edges: four from the apex and the four base sides.
    pub fn frustum_edges(&self) -> [[[f64; 3]; 2]; 8] {
        let [apex, a, b, c, d] = self.frustum;
        [
            [apex, a],
            [apex, b],
            [apex, c],
            [apex, d],
            [a, b],
            [b, c],
            [c, d],
            [d, a],
        ]
    }
}

/// The display label of the camera at `index`.
pub fn glyph_label(index: usize) -> String {
    format!("CAM{:02}", index + 1)
}

/// Compute the glyph of every camera of a set.
///
/// The frustum is a square pyramid with its apex at the camera center, opening
/// along the camera +z axis.
///
/// # Arguments
///
/// * `cameras` - The canonical camera set.
/// * `scales` - The glyph sizes.
///
/// # Returns
///
/// One glyph per camera, in camera order.
pub fn camera_glyphs(
    cameras: &CanonicalCameraSet,
    scales: &GlyphScales,
) -> Result<Vec<CameraGlyph>, LinalgError> {
    let half = scales.frustum / 2.0;
    let height = 1.5 * scales.frustum;
    let frustum_in_camera = [
        [0.0, 0.0, 0.0],
        [-half, -half, height],
        [half, -half, height],
        [half, half, height],
        [-half, half, height],
    ];

    cameras
        .r()
        .iter()
        .zip(cameras.t().iter())
        .enumerate()
        .map(|(i, (r, t))| {
            let (world_r_cam, center) = linalg::invert_rigid(r, t);

            let mut frustum = [[0.0; 3]; 5];
            linalg::transform_points(&frustum_in_camera, &world_r_cam, &center, &mut frustum)?;

            // the columns of the camera-to-world rotation are the camera axes
            let mut axes = [[0.0; 3]; 3];
            for (j, axis) in axes.iter_mut().enumerate() {
                let column = [world_r_cam[0][j], world_r_cam[1][j], world_r_cam[2][j]];
                *axis = linalg::scale3(&column, scales.axis);
            }

            Ok(CameraGlyph {
                label: glyph_label(i),
                center,
                rotation: world_r_cam,
                axes,
                frustum,
                label_scale: scales.label,
            })
        })
        .collect()
}
