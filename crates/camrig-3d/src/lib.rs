#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera records and the canonical camera set.
pub mod camera;

/// Renderer-agnostic camera glyph geometry.
pub mod glyph;

/// I/O utilities for reading and writing calibration and mesh data.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Triangle mesh container.
pub mod mesh;

/// 3D transforms algorithms.
pub mod transforms;

/// Conversions between plain arrays and faer views.
pub mod utils;
