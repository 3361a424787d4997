use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Error types for the bundle module.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Failed to serialize the bundle
    #[error("Failed to serialize camera bundle")]
    Encode(#[from] bincode::error::EncodeError),

    /// Failed to deserialize the bundle
    #[error("Failed to deserialize camera bundle")]
    Decode(#[from] bincode::error::DecodeError),

    /// The bundle holds a different number of intrinsics and extrinsics
    #[error("Bundle holds {0} intrinsics and {1} extrinsics")]
    LengthMismatch(usize, usize),
}

/// Stacked camera matrices, the binary checkpoint of a camera set.
#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct CameraBundle {
    /// The 3x3 intrinsic matrices.
    pub intrinsics: Vec<[[f64; 3]; 3]>,
    /// The 4x4 world-to-camera extrinsic matrices.
    pub extrinsics: Vec<[[f64; 4]; 4]>,
}

/// Write a camera bundle to a binary file.
///
/// # Arguments
///
/// * `path` - The path of the file to create.
/// * `bundle` - The bundle to store.
pub fn write_camera_bundle(path: impl AsRef<Path>, bundle: &CameraBundle) -> Result<(), BundleError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::encode_into_std_write(bundle, &mut writer, bincode::config::standard())?;
    writer.flush()?;
    Ok(())
}

/// Read a camera bundle written by [`write_camera_bundle`].
pub fn read_camera_bundle(path: impl AsRef<Path>) -> Result<CameraBundle, BundleError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let bundle: CameraBundle =
        bincode::decode_from_std_read(&mut reader, bincode::config::standard())?;

    if bundle.intrinsics.len() != bundle.extrinsics.len() {
        return Err(BundleError::LengthMismatch(
            bundle.intrinsics.len(),
            bundle.extrinsics.len(),
        ));
    }

    Ok(bundle)
}
