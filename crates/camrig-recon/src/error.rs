use std::path::PathBuf;

use camrig_3d::{
    camera::CameraSetError,
    io::{
        bundle::BundleError, matlab::MatError, metashape::MetashapeError, mvs::MvsError,
        obj::ObjError,
    },
};

/// Coarse classification of a [`ReconError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A malformed number, line or document.
    Parse,
    /// A camera references calibration data that does not exist.
    Lookup,
    /// The data is well-formed but lacks required content or has the wrong shape.
    Structure,
    /// The input path does not name a supported calibration format.
    UnsupportedFormat,
    /// Reading or writing a file failed.
    Io,
}

/// Error types for the calibration normalizer.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// Failed to read or write MVS camera files
    #[error(transparent)]
    Mvs(#[from] MvsError),

    /// Failed to read the project XML
    #[error(transparent)]
    Metashape(#[from] MetashapeError),

    /// Failed to read the MATLAB calibration
    #[error(transparent)]
    Matlab(#[from] MatError),

    /// Failed to read or write a mesh
    #[error(transparent)]
    Obj(#[from] ObjError),

    /// Failed to write the camera bundle
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// The cameras could not be assembled into a set
    #[error(transparent)]
    CameraSet(#[from] CameraSetError),

    /// A camera references a sensor without calibration
    #[error("Camera {camera_id} references sensor {sensor_id} which has no calibration")]
    MissingIntrinsic {
        /// The id of the camera.
        camera_id: String,
        /// The sensor id the camera references.
        sensor_id: String,
    },

    /// The path is not a supported calibration format
    #[error("Unsupported calibration format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A MAT-file source was given without its translation unit
    #[error("No length unit given for MATLAB calibration {0}")]
    MissingUnit(PathBuf),

    /// The source holds no camera
    #[error("Calibration source holds no camera")]
    EmptySource,

    /// The reference mesh holds no vertex
    #[error("Mesh {0} holds no vertex")]
    EmptyMesh(PathBuf),

    /// Failed to parse the configuration
    #[error("Failed to parse configuration")]
    Config(#[from] serde_json::Error),

    /// Error reading or writing file
    #[error("error reading or writing file")]
    Io(#[from] std::io::Error),
}

impl ReconError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Mvs(e) => match e {
                MvsError::IoError(_) => ErrorKind::Io,
                MvsError::TooFewLines(_) | MvsError::ParseError(_) => ErrorKind::Parse,
            },
            Self::Metashape(e) => match e {
                MetashapeError::IoError(_) | MetashapeError::XmlWriteError(_) => ErrorKind::Io,
                MetashapeError::XmlReadError(_) | MetashapeError::ParseError(_) => {
                    ErrorKind::Parse
                }
                MetashapeError::MissingElement { .. } => ErrorKind::Structure,
            },
            Self::Matlab(e) => match e {
                MatError::IoError(_) => ErrorKind::Io,
                MatError::InvalidHeader(_)
                | MatError::Truncated
                | MatError::UnsupportedElement(_)
                | MatError::MissingVariable(_)
                | MatError::MissingField(_)
                | MatError::InvalidShape(_) => ErrorKind::Structure,
            },
            Self::Obj(e) => match e {
                ObjError::IoError(_)
                | ObjError::LoadError(tobj::LoadError::OpenFileFailed)
                | ObjError::LoadError(tobj::LoadError::ReadError) => ErrorKind::Io,
                ObjError::LoadError(_) | ObjError::DegenerateFace { .. } => ErrorKind::Parse,
            },
            Self::Bundle(e) => match e {
                BundleError::IoError(_) | BundleError::Encode(_) => ErrorKind::Io,
                BundleError::Decode(_) => ErrorKind::Parse,
                BundleError::LengthMismatch(..) => ErrorKind::Structure,
            },
            Self::CameraSet(_) | Self::MissingUnit(_) | Self::EmptySource | Self::EmptyMesh(_) => {
                ErrorKind::Structure
            }
            Self::MissingIntrinsic { .. } => ErrorKind::Lookup,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Config(_) => ErrorKind::Parse,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
