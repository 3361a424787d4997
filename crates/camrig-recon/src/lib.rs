#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Rig configuration.
pub mod config;

/// Error types and their classification.
pub mod error;

/// Reference mesh loading and origin offset.
pub mod mesh_origin;

/// Conversion of every calibration source to the canonical camera set.
pub mod normalize;

/// Persistence of camera sets.
pub mod output;

/// Calibration source dispatch.
pub mod source;

pub use config::RigConfig;
pub use error::{ErrorKind, ReconError};
pub use normalize::{reconstruct_cameras, CameraReconstructor};
pub use source::{CalibrationSource, LengthUnit};
