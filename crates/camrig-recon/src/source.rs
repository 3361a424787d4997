use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use camrig_3d::io::mvs::list_mvs_camera_files;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// Length unit of the translations stored in a calibration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Millimeters, the canonical unit.
    Millimeters,
    /// Meters.
    Meters,
}

impl LengthUnit {
    /// Factor converting a length in this unit to millimeters.
    pub fn to_millimeters(&self) -> f64 {
        match self {
            LengthUnit::Millimeters => 1.0,
            LengthUnit::Meters => 1000.0,
        }
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mm" | "millimeters" => Ok(LengthUnit::Millimeters),
            "m" | "meters" => Ok(LengthUnit::Meters),
            other => Err(format!("unknown length unit {other:?}, expected mm or m")),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthUnit::Millimeters => write!(f, "mm"),
            LengthUnit::Meters => write!(f, "m"),
        }
    }
}

/// A calibration input, with its format decided once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationSource {
    /// Per-camera MVS text files; the position in the list is the camera index.
    MvsPaths(Vec<PathBuf>),
    /// A Metashape project XML file.
    XmlProject(PathBuf),
    /// A MATLAB calibration file and the unit of its translations.
    MatStruct {
        /// The path to the `.mat` file.
        path: PathBuf,
        /// The unit of `ExtT`.
        unit: LengthUnit,
    },
}

impl CalibrationSource {
    /// Decide the source format from the given paths.
    ///
    /// Several paths are MVS camera files. A single path is dispatched on its
    /// extension: `.xml` is a project, `.mat` a MATLAB calibration (which needs
    /// `unit`), `.txt` a single MVS camera, and a directory is scanned for MVS
    /// camera files. Any other extension fails before a file is read.
    ///
    /// # Arguments
    ///
    /// * `paths` - The calibration paths.
    /// * `unit` - The translation unit of a MATLAB calibration.
    pub fn from_paths<P: AsRef<Path>>(
        paths: &[P],
        unit: Option<LengthUnit>,
    ) -> Result<Self, ReconError> {
        match paths {
            [] => Err(ReconError::EmptySource),
            [path] => {
                let path = path.as_ref();
                match extension(path).as_deref() {
                    Some("xml") => Ok(Self::XmlProject(path.to_path_buf())),
                    Some("mat") => match unit {
                        Some(unit) => Ok(Self::MatStruct {
                            path: path.to_path_buf(),
                            unit,
                        }),
                        None => Err(ReconError::MissingUnit(path.to_path_buf())),
                    },
                    Some("txt") => Ok(Self::MvsPaths(vec![path.to_path_buf()])),
                    None if path.is_dir() => Self::from_mvs_dir(path),
                    _ => Err(ReconError::UnsupportedFormat(path.to_path_buf())),
                }
            }
            paths => paths
                .iter()
                .map(|path| {
                    let path = path.as_ref();
                    match extension(path).as_deref() {
                        Some("txt") => Ok(path.to_path_buf()),
                        _ => Err(ReconError::UnsupportedFormat(path.to_path_buf())),
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::MvsPaths),
        }
    }

    /// The MVS camera files of a directory, sorted by name.
    pub fn from_mvs_dir(dir: impl AsRef<Path>) -> Result<Self, ReconError> {
        let paths = list_mvs_camera_files(dir)?;
        if paths.is_empty() {
            return Err(ReconError::EmptySource);
        }
        Ok(Self::MvsPaths(paths))
    }

    /// Short name of the source format, for logging.
    pub fn format_name(&self) -> &'static str {
        match self {
            Self::MvsPaths(_) => "MVS text",
            Self::XmlProject(_) => "Metashape XML",
            Self::MatStruct { .. } => "MATLAB",
        }
    }

    /// The first input path.
    pub fn primary_path(&self) -> Option<&Path> {
        match self {
            Self::MvsPaths(paths) => paths.first().map(|p| p.as_path()),
            Self::XmlProject(path) | Self::MatStruct { path, .. } => Some(path.as_path()),
        }
    }

    /// Factor taking the reference mesh of this source to millimeters before it
    /// is re-centered, or `None` when the mesh is used as read.
    ///
    /// MVS rigs are already in the millimeter mesh frame. Metashape meshes are in
    /// meters and MATLAB meshes share the declared unit of the calibration.
    pub fn mesh_to_millimeters(&self) -> Option<f64> {
        match self {
            Self::MvsPaths(_) => None,
            Self::XmlProject(_) => Some(LengthUnit::Meters.to_millimeters()),
            Self::MatStruct { unit, .. } => Some(unit.to_millimeters()),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_dispatch() -> Result<(), ReconError> {
        assert_eq!(
            CalibrationSource::from_paths(&["cams/cameras.xml"], None)?,
            CalibrationSource::XmlProject(PathBuf::from("cams/cameras.xml"))
        );
        assert_eq!(
            CalibrationSource::from_paths(&["calib.MAT"], Some(LengthUnit::Meters))?,
            CalibrationSource::MatStruct {
                path: PathBuf::from("calib.MAT"),
                unit: LengthUnit::Meters
            }
        );
        assert_eq!(
            CalibrationSource::from_paths(&["a_cam.txt", "b_cam.txt"], None)?,
            CalibrationSource::MvsPaths(vec![
                PathBuf::from("a_cam.txt"),
                PathBuf::from("b_cam.txt")
            ])
        );
        Ok(())
    }

    #[test]
    fn test_unsupported_format() {
        for paths in [vec!["rig.json"], vec!["a_cam.txt", "rig.json"], vec!["noext"]] {
            let err = CalibrationSource::from_paths(&paths, Some(LengthUnit::Millimeters));
            assert!(matches!(
                err.map_err(|e| e.kind()),
                Err(ErrorKind::UnsupportedFormat)
            ));
        }
    }

    #[test]
    fn test_empty_and_unit_errors() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            CalibrationSource::from_paths(&empty, None),
            Err(ReconError::EmptySource)
        ));
        assert!(matches!(
            CalibrationSource::from_paths(&["calib.mat"], None),
            Err(ReconError::MissingUnit(_))
        ));
    }

    #[test]
    fn test_mvs_dir() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        for name in ["00000001_cam.txt", "00000000_cam.txt", "notes.txt"] {
            std::fs::write(dir.path().join(name), "")?;
        }
        let source = CalibrationSource::from_paths(&[dir.path()], None)?;
        assert_eq!(
            source,
            CalibrationSource::MvsPaths(vec![
                dir.path().join("00000000_cam.txt"),
                dir.path().join("00000001_cam.txt")
            ])
        );
        assert_eq!(source.mesh_to_millimeters(), None);

        let empty = tempfile::tempdir()?;
        assert!(matches!(
            CalibrationSource::from_mvs_dir(empty.path()),
            Err(ReconError::EmptySource)
        ));
        Ok(())
    }

    #[test]
    fn test_length_unit() {
        assert_eq!("mm".parse::<LengthUnit>(), Ok(LengthUnit::Millimeters));
        assert_eq!("m".parse::<LengthUnit>(), Ok(LengthUnit::Meters));
        assert!("cm".parse::<LengthUnit>().is_err());
        assert_eq!(LengthUnit::Meters.to_millimeters(), 1000.0);
        assert_eq!(LengthUnit::Meters.to_string(), "m");
    }

    #[test]
    fn test_mesh_scale_follows_unit() {
        let mat = |unit| CalibrationSource::MatStruct {
            path: PathBuf::from("calib.mat"),
            unit,
        };
        assert_eq!(mat(LengthUnit::Millimeters).mesh_to_millimeters(), Some(1.0));
        assert_eq!(mat(LengthUnit::Meters).mesh_to_millimeters(), Some(1000.0));
        assert_eq!(
            CalibrationSource::XmlProject(PathBuf::from("cameras.xml")).mesh_to_millimeters(),
            Some(1000.0)
        );
    }
}
