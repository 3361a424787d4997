use std::path::{Path, PathBuf};

use camrig_3d::{
    camera::CanonicalCameraSet,
    io::{
        matlab::{read_matlab_calibration, MatCamera},
        metashape::{read_metashape_xml, MetashapeCamera},
        mvs::read_mvs_cameras,
    },
    linalg,
    transforms::{rotation_vector_to_matrix, FLIP_YZ},
};

use crate::{
    config::RigConfig,
    error::ReconError,
    output::{save_camera_set, OUTPUT_DIR_NAME},
    source::{CalibrationSource, LengthUnit},
};

/// Translation scale of Metashape projects, meters to millimeters.
pub const METASHAPE_TO_MILLIMETERS: f64 = 1000.0;

/// Read a calibration source and convert it to the canonical convention.
///
/// MVS cameras are used as read. Metashape and MATLAB cameras are converted to
/// world-to-camera millimeter extrinsics and re-centered on `origin_offset`.
///
/// # Arguments
///
/// * `source` - The calibration input.
/// * `origin_offset` - The point moved to the world origin, in millimeters.
/// * `config` - The rig configuration, providing the image size.
///
/// # Returns
///
/// The canonical camera set, in source order.
pub fn reconstruct_cameras(
    source: &CalibrationSource,
    origin_offset: &[f64; 3],
    config: &RigConfig,
) -> Result<CanonicalCameraSet, ReconError> {
    if let Some(path) = source.primary_path() {
        log::info!("Reading {} calibration {}", source.format_name(), path.display());
    }

    let cameras = match source {
        CalibrationSource::MvsPaths(paths) => {
            let records = read_mvs_cameras(paths)?;
            let (intrinsics, extrinsics): (Vec<_>, Vec<_>) = records
                .iter()
                .map(|record| (record.intrinsic, record.extrinsic))
                .unzip();
            CanonicalCameraSet::from_intrinsics_extrinsics(&intrinsics, &extrinsics)?
        }
        CalibrationSource::XmlProject(path) => {
            normalize_metashape(&read_metashape_xml(path)?, origin_offset, config)?
        }
        CalibrationSource::MatStruct { path, unit } => {
            normalize_matlab(&read_matlab_calibration(path)?, *unit, origin_offset)?
        }
    };

    if cameras.is_empty() {
        return Err(ReconError::EmptySource);
    }

    log::info!("Reconstructed {} cameras", cameras.len());
    Ok(cameras)
}

/// Convert Metashape cameras to the canonical convention.
///
/// The camera-to-world transform is inverted, the principal point moved from the
/// image center to the top-left corner, the translation scaled from meters to
/// millimeters and re-centered: `t += R * origin_offset`.
///
/// Fails with a lookup error on the first camera without intrinsic.
pub fn normalize_metashape(
    cameras: &[MetashapeCamera],
    origin_offset: &[f64; 3],
    config: &RigConfig,
) -> Result<CanonicalCameraSet, ReconError> {
    let [shift_x, shift_y] = config.principal_point_shift();

    let mut intrinsics = Vec::with_capacity(cameras.len());
    let mut rotations = Vec::with_capacity(cameras.len());
    let mut translations = Vec::with_capacity(cameras.len());

    for camera in cameras.iter() {
        let Some(mut intrinsic) = camera.intrinsic else {
            return Err(ReconError::MissingIntrinsic {
                camera_id: camera.camera_id.clone().unwrap_or_default(),
                sensor_id: camera.sensor_id.clone().unwrap_or_default(),
            });
        };
        intrinsic[0][2] += shift_x;
        intrinsic[1][2] += shift_y;

        let (world_r_cam, world_t_cam) = linalg::split_rigid(&camera.transform);
        let (r, t) = linalg::invert_rigid(&world_r_cam, &world_t_cam);
        let t = recenter(&r, &linalg::scale3(&t, METASHAPE_TO_MILLIMETERS), origin_offset);

        log::debug!(
            "Camera {:?}: t = {t:?}",
            camera.label.as_deref().or(camera.camera_id.as_deref())
        );

        intrinsics.push(intrinsic);
        rotations.push(r);
        translations.push(t);
    }

    Ok(CanonicalCameraSet::new(&intrinsics, rotations, translations)?)
}

/// Convert MATLAB cameras to the canonical convention.
///
/// The rotation is `rodrigues(ExtR) * diag(1, -1, -1)`, the translation is scaled
/// from `unit` to millimeters and re-centered: `t += R * origin_offset`.
pub fn normalize_matlab(
    cameras: &[MatCamera],
    unit: LengthUnit,
    origin_offset: &[f64; 3],
) -> Result<CanonicalCameraSet, ReconError> {
    let scale = unit.to_millimeters();

    let intrinsics = cameras.iter().map(|c| c.camera_matrix).collect::<Vec<_>>();
    let (rotations, translations): (Vec<_>, Vec<_>) = cameras
        .iter()
        .map(|camera| {
            let r = linalg::matmul33(&rotation_vector_to_matrix(&camera.ext_r), &FLIP_YZ);
            let t = recenter(&r, &linalg::scale3(&camera.ext_t, scale), origin_offset);
            (r, t)
        })
        .unzip();

    Ok(CanonicalCameraSet::new(&intrinsics, rotations, translations)?)
}

/// Move `origin_offset` to the world origin: `t + R * origin_offset`.
fn recenter(r: &[[f64; 3]; 3], t: &[f64; 3], origin_offset: &[f64; 3]) -> [f64; 3] {
    linalg::add3(t, &linalg::matvec33(r, origin_offset))
}

/// Builds the canonical camera set of a source and persists it.
///
/// For a Metashape source the set is written to `output/` next to the project
/// file, so the converted cameras can be read back as MVS text.
#[derive(Debug)]
pub struct CameraReconstructor {
    cameras: CanonicalCameraSet,
    output_dir: Option<PathBuf>,
}

impl CameraReconstructor {
    /// Reconstruct the cameras of `source`, see [`reconstruct_cameras`].
    pub fn new(
        source: &CalibrationSource,
        origin_offset: &[f64; 3],
        config: &RigConfig,
    ) -> Result<Self, ReconError> {
        let cameras = reconstruct_cameras(source, origin_offset, config)?;

        let output_dir = match source {
            CalibrationSource::XmlProject(path) => {
                let dir = path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(OUTPUT_DIR_NAME);
                save_camera_set(&dir, &cameras)?;
                Some(dir)
            }
            _ => None,
        };

        Ok(Self {
            cameras,
            output_dir,
        })
    }

    /// The canonical camera set.
    pub fn cameras(&self) -> &CanonicalCameraSet {
        &self.cameras
    }

    /// The directory the set was persisted to, if any.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Consume the reconstructor and return the camera set.
    pub fn into_cameras(self) -> CanonicalCameraSet {
        self.cameras
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;
    use camrig_3d::linalg::IDENTITY_33;

    fn metashape_camera(transform: [[f64; 4]; 4]) -> MetashapeCamera {
        MetashapeCamera {
            camera_id: Some("0".to_string()),
            sensor_id: Some("0".to_string()),
            component_id: None,
            label: Some("cam".to_string()),
            transform,
            rotation_covariance: None,
            location_covariance: None,
            intrinsic: Some([[1500.0, 0.0, 4.5], [0.0, 1500.0, -3.0], [0.0, 0.0, 1.0]]),
        }
    }

    #[test]
    fn test_metashape_conventions() -> Result<(), ReconError> {
        // camera at (1, 2, 3) meters, rotated 90 degrees about z
        let transform = [
            [0.0, -1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 2.0],
            [0.0, 0.0, 1.0, 3.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let config = RigConfig::default();
        let cameras = normalize_metashape(&[metashape_camera(transform)], &[0.0; 3], &config)?;

        let k = cameras.intrinsic(0).ok_or(ReconError::EmptySource)?;
        assert_eq!(k[0][2], 4.5 + 992.0);
        assert_eq!(k[1][2], -3.0 + 992.0);

        assert_eq!(cameras.r()[0], [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let center = cameras.camera_center(0).ok_or(ReconError::EmptySource)?;
        for (c, e) in center.iter().zip([1000.0, 2000.0, 3000.0].iter()) {
            assert_relative_eq!(*c, *e, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_metashape_recentering() -> Result<(), ReconError> {
        let transform = [
            [1.0, 0.0, 0.0, 0.5],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, -1.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let offset = [100.0, -50.0, 25.0];
        let cameras =
            normalize_metashape(&[metashape_camera(transform)], &offset, &RigConfig::default())?;

        // the camera center moves by -offset
        let center = cameras.camera_center(0).ok_or(ReconError::EmptySource)?;
        for (c, e) in center.iter().zip([400.0, 50.0, -1025.0].iter()) {
            assert_relative_eq!(*c, *e, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_metashape_missing_intrinsic() {
        let mut first = metashape_camera(camrig_3d::linalg::IDENTITY_44);
        first.intrinsic = None;
        first.camera_id = Some("4".to_string());
        first.sensor_id = Some("9".to_string());
        let mut second = first.clone();
        second.camera_id = Some("5".to_string());

        let err = normalize_metashape(&[first, second], &[0.0; 3], &RigConfig::default());
        match err {
            Err(e @ ReconError::MissingIntrinsic { .. }) => {
                assert_eq!(e.kind(), ErrorKind::Lookup);
                assert_eq!(
                    e.to_string(),
                    "Camera 4 references sensor 9 which has no calibration"
                );
            }
            other => panic!("expected a lookup error, got {other:?}"),
        }
    }

    #[test]
    fn test_matlab_conventions() -> Result<(), ReconError> {
        let camera = MatCamera {
            camera_matrix: [[800.0, 0.0, 320.0], [0.0, 800.0, 240.0], [0.0, 0.0, 1.0]],
            dist_coeffs: vec![],
            ext_r: [0.0, 0.0, 0.0],
            ext_t: [0.1, -0.2, 1.5],
        };

        let in_mm = normalize_matlab(std::slice::from_ref(&camera), LengthUnit::Millimeters, &[0.0; 3])?;
        assert_eq!(in_mm.r()[0], FLIP_YZ);
        assert_eq!(in_mm.t()[0], [0.1, -0.2, 1.5]);
        assert_eq!(in_mm.intrinsic(0), Some(camera.camera_matrix));

        let in_m = normalize_matlab(std::slice::from_ref(&camera), LengthUnit::Meters, &[0.0; 3])?;
        assert_relative_eq!(in_m.t()[0][2], 1500.0);

        // flipped y and z axes: t += diag(1, -1, -1) * offset
        let shifted = normalize_matlab(&[camera], LengthUnit::Millimeters, &[1.0, 2.0, 3.0])?;
        let t = shifted.t()[0];
        assert_relative_eq!(t[0], 1.1);
        assert_relative_eq!(t[1], -2.2);
        assert_relative_eq!(t[2], -1.5);
        Ok(())
    }

    #[test]
    fn test_recenter_identity() {
        assert_eq!(recenter(&IDENTITY_33, &[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]), [2.0, 3.0, 4.0]);
    }
}
