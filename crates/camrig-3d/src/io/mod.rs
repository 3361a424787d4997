/// Binary camera bundle reader and writer.
pub mod bundle;

/// MATLAB calibration (Level 5 MAT-file) reader.
pub mod matlab;

/// Metashape project XML reader and writer.
pub mod metashape;

/// Per-camera MVS text reader and writer.
pub mod mvs;

/// Wavefront OBJ mesh reader and writer.
pub mod obj;

/// Parse a whitespace separated line of floats.
pub(crate) fn parse_floats(line: &str) -> Result<Vec<f64>, std::num::ParseFloatError> {
    line.split_whitespace()
        .map(|s| s.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
}
