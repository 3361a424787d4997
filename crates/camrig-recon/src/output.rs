use std::path::{Path, PathBuf};

use camrig_3d::{
    camera::CanonicalCameraSet,
    io::{
        bundle::{write_camera_bundle, CameraBundle},
        mvs::{mvs_camera_file_name, write_mvs_camera},
    },
};

use crate::error::ReconError;

/// Name of the output directory created next to the calibration input.
pub const OUTPUT_DIR_NAME: &str = "output";

/// File name of the binary camera bundle.
pub const BUNDLE_FILE_NAME: &str = "cameras.bin";

/// Sub-directory holding one MVS text file per camera.
pub const CAMS_DIR_NAME: &str = "cams";

/// Persist a camera set as a binary bundle and one MVS text file per camera.
///
/// Writes `<dir>/cameras.bin` and `<dir>/cams/{index:08}_cam.txt`. Existing
/// directories are reused; the first failing write aborts.
///
/// # Arguments
///
/// * `dir` - The output directory.
/// * `cameras` - The camera set to store.
///
/// # Returns
///
/// The paths of the per-camera files, in camera order.
pub fn save_camera_set(
    dir: impl AsRef<Path>,
    cameras: &CanonicalCameraSet,
) -> Result<Vec<PathBuf>, ReconError> {
    let dir = dir.as_ref();
    let cams_dir = dir.join(CAMS_DIR_NAME);
    std::fs::create_dir_all(&cams_dir)?;

    let intrinsics = cameras.intrinsics();
    let extrinsics = cameras.extrinsics();

    let bundle = CameraBundle {
        intrinsics: intrinsics.clone(),
        extrinsics: extrinsics.clone(),
    };
    write_camera_bundle(dir.join(BUNDLE_FILE_NAME), &bundle)?;

    let paths = intrinsics
        .iter()
        .zip(extrinsics.iter())
        .enumerate()
        .map(|(i, (intrinsic, extrinsic))| {
            let path = cams_dir.join(mvs_camera_file_name(i));
            write_mvs_camera(&path, intrinsic, extrinsic)?;
            Ok(path)
        })
        .collect::<Result<Vec<_>, ReconError>>()?;

    log::info!(
        "Saved {} cameras to {}",
        cameras.len(),
        dir.display()
    );

    Ok(paths)
}
