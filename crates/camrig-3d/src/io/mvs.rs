use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use super::parse_floats;
use crate::camera::RawCameraRecord;

/// Minimum number of lines of an MVS camera file.
const MIN_LINES: usize = 10;

/// Suffix of MVS camera file names.
pub const MVS_CAMERA_SUFFIX: &str = "_cam.txt";

/// Error types for the MVS module.
#[derive(Debug, thiserror::Error)]
pub enum MvsError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// The file is shorter than the fixed layout
    #[error("Expected at least 10 lines, found {0}")]
    TooFewLines(usize),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),
}

/// File name of the MVS camera file with the given index, e.g. `00000003_cam.txt`.
pub fn mvs_camera_file_name(index: usize) -> String {
    format!("{index:08}{MVS_CAMERA_SUFFIX}")
}

/// Read one MVS camera file.
///
/// The layout is fixed: line 0 is a header, lines 1-4 hold the row-major 4x4
/// extrinsic, line 6 is a header and lines 7-9 hold the row-major 3x3 intrinsic.
///
/// # Arguments
///
/// * `path` - The path to the camera file.
///
/// # Returns
///
/// The intrinsic and extrinsic matrices as stored in the file.
pub fn read_mvs_camera(path: impl AsRef<Path>) -> Result<RawCameraRecord, MvsError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
    parse_mvs_camera(&lines)
}

/// Read a list of MVS camera files.
///
/// The output has the same length and order as `paths`; the position in the list is
/// the camera index. The first failing file aborts the whole read.
pub fn read_mvs_cameras<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RawCameraRecord>, MvsError> {
    paths
        .iter()
        .map(|path| {
            log::debug!("Reading MVS camera {}", path.as_ref().display());
            read_mvs_camera(path)
        })
        .collect()
}

fn parse_mvs_camera<S: AsRef<str>>(lines: &[S]) -> Result<RawCameraRecord, MvsError> {
    if lines.len() < MIN_LINES {
        return Err(MvsError::TooFewLines(lines.len()));
    }

    let extrinsic_values = parse_block(&lines[1..5], 16)?;
    let intrinsic_values = parse_block(&lines[7..10], 9)?;

    let mut extrinsic = [[0.0; 4]; 4];
    for (row, chunk) in extrinsic.iter_mut().zip(extrinsic_values.chunks_exact(4)) {
        row.copy_from_slice(chunk);
    }

    let mut intrinsic = [[0.0; 3]; 3];
    for (row, chunk) in intrinsic.iter_mut().zip(intrinsic_values.chunks_exact(3)) {
        row.copy_from_slice(chunk);
    }

    Ok(RawCameraRecord {
        intrinsic,
        extrinsic,
    })
}

fn parse_block<S: AsRef<str>>(lines: &[S], expected: usize) -> Result<Vec<f64>, MvsError> {
    let joined = lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    let values = parse_floats(&joined).map_err(|e| MvsError::ParseError(format!("{joined}: {e}")))?;
    if values.len() != expected {
        return Err(MvsError::ParseError(format!(
            "Expected {expected} values, found {}",
            values.len()
        )));
    }
    Ok(values)
}

/// Write one MVS camera file.
///
/// Values are written with the shortest representation that parses back to the same
/// float, so reading the file again is exact.
///
/// # Arguments
///
/// * `path` - The path of the file to create.
/// * `intrinsic` - The 3x3 intrinsic matrix.
/// * `extrinsic` - The 4x4 world-to-camera extrinsic matrix.
pub fn write_mvs_camera(
    path: impl AsRef<Path>,
    intrinsic: &[[f64; 3]; 3],
    extrinsic: &[[f64; 4]; 4],
) -> Result<(), MvsError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "extrinsic")?;
    for row in extrinsic.iter() {
        writeln!(writer, "{}", join_row(row))?;
    }
    writeln!(writer)?;
    writeln!(writer, "intrinsic")?;
    for row in intrinsic.iter() {
        writeln!(writer, "{}", join_row(row))?;
    }

    writer.flush()?;
    Ok(())
}

fn join_row(row: &[f64]) -> String {
    row.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// List the MVS camera files of a directory, sorted by file name.
pub fn list_mvs_camera_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, MvsError> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(MVS_CAMERA_SUFFIX))
        })
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}
