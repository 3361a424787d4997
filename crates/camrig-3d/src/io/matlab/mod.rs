mod parser;
mod writer;

use std::path::Path;

pub use parser::{parse_mat_bytes, read_mat_file};
pub use writer::{encode_mat_bytes, write_mat_file, MatWriteOptions};

/// Root variable of a plain calibration file.
pub const CALIBRATION_KEY: &str = "calibration";

/// Root variable of a calibration file produced by the optimizer.
pub const OPTIMIZED_CALIBRATION_KEY: &str = "calibrationOptimized";

/// Error types for the MATLAB module.
#[derive(Debug, thiserror::Error)]
pub enum MatError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// The 128-byte header is missing or not a Level 5 header
    #[error("Invalid MAT-file header: {0}")]
    InvalidHeader(String),

    /// An element runs past the end of its container
    #[error("Truncated MAT-file element")]
    Truncated,

    /// An element or array class the reader does not handle
    #[error("Unsupported MAT-file element: {0}")]
    UnsupportedElement(String),

    /// A required variable is absent
    #[error("Variable {0} not found")]
    MissingVariable(String),

    /// A required struct field is absent
    #[error("Field {0} not found")]
    MissingField(String),

    /// An array does not have the expected shape or kind
    #[error("Invalid array shape: {0}")]
    InvalidShape(String),
}

/// Byte order of a MAT-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Little-endian, header indicator `IM`.
    Little,
    /// Big-endian, header indicator `MI`.
    Big,
}

impl Endian {
    pub(crate) fn u16_from(self, bytes: &[u8]) -> u16 {
        let b = [bytes[0], bytes[1]];
        match self {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        }
    }

    pub(crate) fn u32_from(self, bytes: &[u8]) -> u32 {
        let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        }
    }

    pub(crate) fn u64_from(self, bytes: &[u8]) -> u64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&bytes[..8]);
        match self {
            Endian::Little => u64::from_le_bytes(b),
            Endian::Big => u64::from_be_bytes(b),
        }
    }
}

/// A MATLAB array as read from a MAT-file.
///
/// Numeric data of every class is widened to `f64` and kept in MATLAB's
/// column-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum MatArray {
    /// A numeric array.
    Numeric {
        /// The dimensions of the array.
        dims: Vec<usize>,
        /// The real part, column-major.
        data: Vec<f64>,
    },
    /// A character array.
    Char {
        /// The dimensions of the array.
        dims: Vec<usize>,
        /// The characters, column-major.
        text: String,
    },
    /// A cell array.
    Cell {
        /// The dimensions of the array.
        dims: Vec<usize>,
        /// The cells, column-major.
        items: Vec<MatArray>,
    },
    /// A struct array.
    Struct {
        /// The dimensions of the array.
        dims: Vec<usize>,
        /// The field names, in storage order.
        field_names: Vec<String>,
        /// One entry per struct element, column-major, each holding the field values in `field_names` order.
        elements: Vec<Vec<MatArray>>,
    },
}

impl MatArray {
    /// A 1x1 numeric array.
    pub fn scalar(value: f64) -> Self {
        Self::Numeric {
            dims: vec![1, 1],
            data: vec![value],
        }
    }

    /// A 1xN numeric array.
    pub fn row(values: &[f64]) -> Self {
        Self::Numeric {
            dims: vec![1, values.len()],
            data: values.to_vec(),
        }
    }

    /// A numeric matrix from row-major rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatError> {
        let ncols = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != ncols) {
            return Err(MatError::InvalidShape("rows of unequal length".to_string()));
        }
        let data = (0..ncols)
            .flat_map(|c| rows.iter().map(move |r| r[c]))
            .collect();
        Ok(Self::Numeric {
            dims: vec![rows.len(), ncols],
            data,
        })
    }

    /// The dimensions of the array.
    pub fn dims(&self) -> &[usize] {
        match self {
            Self::Numeric { dims, .. }
            | Self::Char { dims, .. }
            | Self::Cell { dims, .. }
            | Self::Struct { dims, .. } => dims,
        }
    }

    /// Number of rows, or 0 for an array without dimensions.
    pub fn num_rows(&self) -> usize {
        self.dims().first().copied().unwrap_or(0)
    }

    /// Number of columns, the product of every dimension after the first.
    pub fn num_cols(&self) -> usize {
        self.dims().iter().skip(1).product()
    }

    /// Value of a struct field in the struct element at `index`.
    pub fn field(&self, index: usize, name: &str) -> Option<&MatArray> {
        match self {
            Self::Struct {
                field_names,
                elements,
                ..
            } => {
                let position = field_names.iter().position(|f| f == name)?;
                elements.get(index)?.get(position)
            }
            _ => None,
        }
    }

    /// Number of struct elements or cells, `None` for other kinds.
    pub fn num_elements(&self) -> Option<usize> {
        match self {
            Self::Struct { elements, .. } => Some(elements.len()),
            Self::Cell { items, .. } => Some(items.len()),
            _ => None,
        }
    }
}

/// The per-camera content of a MATLAB calibration file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatCamera {
    /// The 3x3 camera matrix, row-major.
    pub camera_matrix: [[f64; 3]; 3],
    /// The distortion coefficients, carried but not applied.
    pub dist_coeffs: Vec<f64>,
    /// The rotation vector of the camera.
    pub ext_r: [f64; 3],
    /// The translation of the camera.
    pub ext_t: [f64; 3],
}

/// Root variable name for a calibration file.
///
/// Files whose name starts with `optimized` hold `calibrationOptimized`, all
/// others hold `calibration`.
pub fn calibration_root_key(path: impl AsRef<Path>) -> &'static str {
    let is_optimized = path
        .as_ref()
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("optimized"));
    if is_optimized {
        OPTIMIZED_CALIBRATION_KEY
    } else {
        CALIBRATION_KEY
    }
}

/// Read the cameras of a MATLAB calibration file.
///
/// # Arguments
///
/// * `path` - The path to the `.mat` file.
///
/// # Returns
///
/// One entry per camera, in the order of the `ImageSize` rows.
pub fn read_matlab_calibration(path: impl AsRef<Path>) -> Result<Vec<MatCamera>, MatError> {
    let root_key = calibration_root_key(&path);
    log::debug!(
        "Reading MATLAB calibration {} with root {root_key}",
        path.as_ref().display()
    );
    let variables = read_mat_file(path)?;
    calibration_from_variables(&variables, root_key)
}

/// Extract the cameras from the variables of a calibration file.
///
/// The root struct carries `ImageSize` (one row per camera), `CameraParameters`
/// (a struct array or a cell of structs with `cameraMatrix` and `distCoeffs`),
/// `ExtR` and `ExtT` (an Nx3 or 3xN matrix, or a cell of 3-vectors).
pub fn calibration_from_variables(
    variables: &[(String, MatArray)],
    root_key: &str,
) -> Result<Vec<MatCamera>, MatError> {
    let root = variables
        .iter()
        .find(|(name, _)| name == root_key)
        .map(|(_, array)| array)
        .ok_or_else(|| MatError::MissingVariable(root_key.to_string()))?;

    let required = |name: &str| {
        root.field(0, name)
            .ok_or_else(|| MatError::MissingField(format!("{root_key}.{name}")))
    };

    let image_size = required("ImageSize")?;
    let num_cameras = match image_size {
        MatArray::Cell { items, .. } => items.len(),
        _ => image_size.num_rows(),
    };

    let params = required("CameraParameters")?;
    let ext_r = required("ExtR")?;
    let ext_t = required("ExtT")?;

    (0..num_cameras)
        .map(|i| {
            let param = camera_parameters_at(params, i)?;
            let camera_matrix = param
                .field(0, "cameraMatrix")
                .ok_or_else(|| MatError::MissingField(format!("CameraParameters({i}).cameraMatrix")))?;
            let dist_coeffs = match param.field(0, "distCoeffs") {
                Some(MatArray::Numeric { data, .. }) => data.clone(),
                Some(_) => {
                    return Err(MatError::InvalidShape(format!(
                        "CameraParameters({i}).distCoeffs is not numeric"
                    )))
                }
                None => Vec::new(),
            };

            Ok(MatCamera {
                camera_matrix: matrix33(camera_matrix)?,
                dist_coeffs,
                ext_r: vector3_at(ext_r, i, num_cameras)?,
                ext_t: vector3_at(ext_t, i, num_cameras)?,
            })
        })
        .collect()
}

/// The 1x1 struct of camera `index`, from a struct array or a cell of structs.
fn camera_parameters_at(params: &MatArray, index: usize) -> Result<MatArray, MatError> {
    let out_of_range = || {
        MatError::InvalidShape(format!("CameraParameters has no entry {index}"))
    };
    match params {
        MatArray::Struct {
            field_names,
            elements,
            ..
        } => {
            let element = elements.get(index).ok_or_else(out_of_range)?;
            Ok(MatArray::Struct {
                dims: vec![1, 1],
                field_names: field_names.clone(),
                elements: vec![element.clone()],
            })
        }
        MatArray::Cell { items, .. } => items.get(index).cloned().ok_or_else(out_of_range),
        _ => Err(MatError::InvalidShape(
            "CameraParameters is neither a struct array nor a cell".to_string(),
        )),
    }
}

fn matrix33(array: &MatArray) -> Result<[[f64; 3]; 3], MatError> {
    let invalid = || {
        MatError::InvalidShape(format!(
            "expected a 3x3 matrix, found dims {:?}",
            array.dims()
        ))
    };

    match array {
        MatArray::Numeric { dims, data } if dims.as_slice() == [3, 3] => {
            let mut m = [[0.0; 3]; 3];
            for (r, row) in m.iter_mut().enumerate() {
                for (c, v) in row.iter_mut().enumerate() {
                    *v = *data.get(r + 3 * c).ok_or_else(invalid)?;
                }
            }
            Ok(m)
        }
        _ => Err(invalid()),
    }
}

/// The 3-vector of camera `index` from an Nx3 / 3xN matrix or a cell of vectors.
fn vector3_at(array: &MatArray, index: usize, num_cameras: usize) -> Result<[f64; 3], MatError> {
    let invalid = || {
        MatError::InvalidShape(format!(
            "no 3-vector for camera {index} in array of dims {:?}",
            array.dims()
        ))
    };
    let pick = |data: &[f64], offsets: [usize; 3]| -> Result<[f64; 3], MatError> {
        let mut v = [0.0; 3];
        for (out, offset) in v.iter_mut().zip(offsets) {
            *out = *data.get(offset).ok_or_else(invalid)?;
        }
        Ok(v)
    };

    match array {
        MatArray::Numeric { data, .. } => {
            let (nrows, ncols) = (array.num_rows(), array.num_cols());
            if nrows == num_cameras && ncols == 3 && index < nrows {
                // one camera per row
                pick(data, [index, index + nrows, index + 2 * nrows])
            } else if nrows == 3 && ncols == num_cameras && index < ncols {
                // one camera per column
                let start = 3 * index;
                pick(data, [start, start + 1, start + 2])
            } else {
                Err(invalid())
            }
        }
        MatArray::Cell { items, .. } => match items.get(index) {
            Some(MatArray::Numeric { data, .. }) if data.len() == 3 => pick(data, [0, 1, 2]),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera_params(f: f64) -> Vec<MatArray> {
        vec![
            MatArray::from_rows(&[
                vec![f, 0.0, 320.0],
                vec![0.0, f, 240.0],
                vec![0.0, 0.0, 1.0],
            ])
            .expect("square"),
            MatArray::row(&[0.1, -0.01, 0.0, 0.0, 0.0]),
        ]
    }

    fn calibration(params: MatArray, ext_r: MatArray, ext_t: MatArray) -> MatArray {
        MatArray::Struct {
            dims: vec![1, 1],
            field_names: vec![
                "ImageSize".to_string(),
                "CameraParameters".to_string(),
                "ExtR".to_string(),
                "ExtT".to_string(),
            ],
            elements: vec![vec![
                MatArray::from_rows(&[vec![480.0, 640.0], vec![480.0, 640.0]]).expect("rows"),
                params,
                ext_r,
                ext_t,
            ]],
        }
    }

    fn struct_array_params() -> MatArray {
        MatArray::Struct {
            dims: vec![1, 2],
            field_names: vec!["cameraMatrix".to_string(), "distCoeffs".to_string()],
            elements: vec![camera_params(800.0), camera_params(900.0)],
        }
    }

    #[test]
    fn test_calibration_root_key() {
        assert_eq!(calibration_root_key("/data/calib.mat"), CALIBRATION_KEY);
        assert_eq!(
            calibration_root_key("/data/optimized_calib.mat"),
            OPTIMIZED_CALIBRATION_KEY
        );
        assert_eq!(
            calibration_root_key("/optimized/calib.mat"),
            CALIBRATION_KEY
        );
    }

    #[test]
    fn test_struct_array_with_row_vectors() -> Result<(), MatError> {
        let root = calibration(
            struct_array_params(),
            MatArray::from_rows(&[vec![0.0, 0.0, 0.0], vec![0.1, 0.2, 0.3]])?,
            MatArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])?,
        );
        let cameras = calibration_from_variables(&[(CALIBRATION_KEY.to_string(), root)], CALIBRATION_KEY)?;

        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].camera_matrix[0], [800.0, 0.0, 320.0]);
        assert_eq!(cameras[1].camera_matrix[1], [0.0, 900.0, 240.0]);
        assert_eq!(cameras[1].ext_r, [0.1, 0.2, 0.3]);
        assert_eq!(cameras[1].ext_t, [4.0, 5.0, 6.0]);
        assert_relative_eq!(cameras[0].dist_coeffs[0], 0.1);
        Ok(())
    }

    #[test]
    fn test_cell_layout_with_column_vectors() -> Result<(), MatError> {
        let params = MatArray::Cell {
            dims: vec![1, 2],
            items: vec![
                MatArray::Struct {
                    dims: vec![1, 1],
                    field_names: vec!["cameraMatrix".to_string(), "distCoeffs".to_string()],
                    elements: vec![camera_params(800.0)],
                },
                MatArray::Struct {
                    dims: vec![1, 1],
                    field_names: vec!["cameraMatrix".to_string(), "distCoeffs".to_string()],
                    elements: vec![camera_params(900.0)],
                },
            ],
        };
        let ext_r = MatArray::Cell {
            dims: vec![2, 1],
            items: vec![MatArray::row(&[0.0, 0.0, 0.0]), MatArray::row(&[0.3, 0.2, 0.1])],
        };
        // 3x2, one camera per column
        let ext_t = MatArray::from_rows(&[vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]])?;
        let root = calibration(params, ext_r, ext_t);

        let cameras = calibration_from_variables(
            &[(OPTIMIZED_CALIBRATION_KEY.to_string(), root)],
            OPTIMIZED_CALIBRATION_KEY,
        )?;
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[1].camera_matrix[0][0], 900.0);
        assert_eq!(cameras[1].ext_r, [0.3, 0.2, 0.1]);
        assert_eq!(cameras[0].ext_t, [1.0, 2.0, 3.0]);
        assert_eq!(cameras[1].ext_t, [4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_missing_root_and_field() -> Result<(), MatError> {
        let root = calibration(
            struct_array_params(),
            MatArray::from_rows(&[vec![0.0; 3], vec![0.0; 3]])?,
            MatArray::from_rows(&[vec![0.0; 3], vec![0.0; 3]])?,
        );
        let variables = vec![(CALIBRATION_KEY.to_string(), root)];
        assert!(matches!(
            calibration_from_variables(&variables, OPTIMIZED_CALIBRATION_KEY),
            Err(MatError::MissingVariable(_))
        ));

        let incomplete = MatArray::Struct {
            dims: vec![1, 1],
            field_names: vec!["ImageSize".to_string()],
            elements: vec![vec![MatArray::from_rows(&[vec![480.0, 640.0]])?]],
        };
        assert!(matches!(
            calibration_from_variables(&[(CALIBRATION_KEY.to_string(), incomplete)], CALIBRATION_KEY),
            Err(MatError::MissingField(_))
        ));
        Ok(())
    }

    #[test]
    fn test_short_extrinsics() -> Result<(), MatError> {
        let root = calibration(
            struct_array_params(),
            MatArray::from_rows(&[vec![0.0, 0.0, 0.0]])?,
            MatArray::from_rows(&[vec![0.0; 3], vec![0.0; 3]])?,
        );
        assert!(matches!(
            calibration_from_variables(&[(CALIBRATION_KEY.to_string(), root)], CALIBRATION_KEY),
            Err(MatError::InvalidShape(_))
        ));
        Ok(())
    }

    #[test]
    fn test_payload_shorter_than_dims() -> Result<(), MatError> {
        let short_matrix = MatArray::Struct {
            dims: vec![1, 2],
            field_names: vec!["cameraMatrix".to_string(), "distCoeffs".to_string()],
            elements: vec![
                camera_params(800.0),
                vec![
                    MatArray::Numeric {
                        dims: vec![3, 3],
                        data: vec![1.0],
                    },
                    MatArray::row(&[0.0; 5]),
                ],
            ],
        };
        let root = calibration(
            short_matrix,
            MatArray::from_rows(&[vec![0.0; 3], vec![0.0; 3]])?,
            MatArray::from_rows(&[vec![0.0; 3], vec![0.0; 3]])?,
        );
        assert!(matches!(
            calibration_from_variables(&[(CALIBRATION_KEY.to_string(), root)], CALIBRATION_KEY),
            Err(MatError::InvalidShape(_))
        ));

        let short_ext_t = MatArray::Numeric {
            dims: vec![2, 3],
            data: vec![1.0],
        };
        let root = calibration(
            struct_array_params(),
            MatArray::from_rows(&[vec![0.0; 3], vec![0.0; 3]])?,
            short_ext_t,
        );
        assert!(matches!(
            calibration_from_variables(&[(CALIBRATION_KEY.to_string(), root)], CALIBRATION_KEY),
            Err(MatError::InvalidShape(_))
        ));
        Ok(())
    }

    #[test]
    fn test_read_compressed_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("optimized_rig.mat");
        let root = calibration(
            struct_array_params(),
            MatArray::from_rows(&[vec![0.0, 0.0, 0.0], vec![0.1, 0.2, 0.3]])?,
            MatArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])?,
        );
        write_mat_file(
            &path,
            &[
                ("__note", MatArray::Char { dims: vec![1, 2], text: "hi".to_string() }),
                (OPTIMIZED_CALIBRATION_KEY, root),
            ],
            MatWriteOptions::default(),
        )?;

        let cameras = read_matlab_calibration(&path)?;
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].ext_t, [1.0, 2.0, 3.0]);
        assert_eq!(cameras[1].dist_coeffs.len(), 5);
        Ok(())
    }
}
