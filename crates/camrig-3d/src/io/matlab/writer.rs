use std::io::Write;
use std::path::Path;

use flate2::{write::ZlibEncoder, Compression};

use super::parser::{
    HEADER_LEN, MI_COMPRESSED, MI_DOUBLE, MI_INT32, MI_INT8, MI_MATRIX, MI_UINT16, MI_UINT32,
    MX_CELL_CLASS, MX_CHAR_CLASS, MX_DOUBLE_CLASS, MX_STRUCT_CLASS,
};
use super::{Endian, MatArray, MatError};

/// Options of the MAT-file writer.
#[derive(Debug, Clone, Copy)]
pub struct MatWriteOptions {
    /// Byte order of the file.
    pub endian: Endian,
    /// Wrap every variable in a zlib-compressed element, as MATLAB v7 does.
    pub compress: bool,
}

impl Default for MatWriteOptions {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            compress: true,
        }
    }
}

/// Write variables to a Level 5 MAT-file.
///
/// Numeric arrays are stored as double, char arrays as UTF-16.
///
/// # Arguments
///
/// * `path` - The path of the file to create.
/// * `variables` - The (name, array) pairs to store, in order.
/// * `options` - Byte order and compression.
pub fn write_mat_file(
    path: impl AsRef<Path>,
    variables: &[(&str, MatArray)],
    options: MatWriteOptions,
) -> Result<(), MatError> {
    let bytes = encode_mat_bytes(variables, options)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Encode variables as the bytes of a Level 5 MAT-file.
pub fn encode_mat_bytes(
    variables: &[(&str, MatArray)],
    options: MatWriteOptions,
) -> Result<Vec<u8>, MatError> {
    let endian = options.endian;
    let mut out = header(endian);

    for (name, array) in variables.iter() {
        let element = encode_matrix(name, array, endian)?;
        if options.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&element)?;
            let compressed = encoder.finish()?;
            push_u32(&mut out, MI_COMPRESSED, endian);
            push_u32(&mut out, len_u32(compressed.len())?, endian);
            out.extend_from_slice(&compressed);
        } else {
            out.extend_from_slice(&element);
        }
    }

    Ok(out)
}

fn header(endian: Endian) -> Vec<u8> {
    let text = "MATLAB 5.0 MAT-file, Platform: camrig, Created by: camrig";
    let mut out = vec![b' '; 116];
    out[..text.len()].copy_from_slice(text.as_bytes());
    out.extend_from_slice(&[0u8; 8]);
    match endian {
        Endian::Little => {
            out.extend_from_slice(&0x0100u16.to_le_bytes());
            out.extend_from_slice(b"IM");
        }
        Endian::Big => {
            out.extend_from_slice(&0x0100u16.to_be_bytes());
            out.extend_from_slice(b"MI");
        }
    }
    debug_assert_eq!(out.len(), HEADER_LEN);
    out
}

/// Encode a full miMATRIX element, tag included.
fn encode_matrix(name: &str, array: &MatArray, endian: Endian) -> Result<Vec<u8>, MatError> {
    let (class, dims) = match array {
        MatArray::Numeric { dims, .. } => (MX_DOUBLE_CLASS, dims),
        MatArray::Char { dims, .. } => (MX_CHAR_CLASS, dims),
        MatArray::Cell { dims, .. } => (MX_CELL_CLASS, dims),
        MatArray::Struct { dims, .. } => (MX_STRUCT_CLASS, dims),
    };

    let mut body = Vec::new();

    let mut flags = Vec::new();
    push_u32(&mut flags, class, endian);
    push_u32(&mut flags, 0, endian);
    push_element(&mut body, MI_UINT32, &flags, endian)?;

    let mut dims_bytes = Vec::new();
    for d in dims.iter() {
        let d = i32::try_from(*d).map_err(|_| MatError::InvalidShape(format!("dimension {d}")))?;
        push_u32(&mut dims_bytes, d as u32, endian);
    }
    push_element(&mut body, MI_INT32, &dims_bytes, endian)?;

    push_element(&mut body, MI_INT8, name.as_bytes(), endian)?;

    match array {
        MatArray::Numeric { data, .. } => {
            let mut bytes = Vec::with_capacity(data.len() * 8);
            for v in data.iter() {
                match endian {
                    Endian::Little => bytes.extend_from_slice(&v.to_le_bytes()),
                    Endian::Big => bytes.extend_from_slice(&v.to_be_bytes()),
                }
            }
            push_element(&mut body, MI_DOUBLE, &bytes, endian)?;
        }
        MatArray::Char { text, .. } => {
            let mut bytes = Vec::new();
            for unit in text.encode_utf16() {
                match endian {
                    Endian::Little => bytes.extend_from_slice(&unit.to_le_bytes()),
                    Endian::Big => bytes.extend_from_slice(&unit.to_be_bytes()),
                }
            }
            push_element(&mut body, MI_UINT16, &bytes, endian)?;
        }
        MatArray::Cell { items, .. } => {
            for item in items.iter() {
                body.extend_from_slice(&encode_matrix("", item, endian)?);
            }
        }
        MatArray::Struct {
            field_names,
            elements,
            ..
        } => {
            let name_len = field_names.iter().map(|n| n.len()).max().unwrap_or(0) + 1;
            let mut len_bytes = Vec::new();
            push_u32(&mut len_bytes, len_u32(name_len)?, endian);
            push_element(&mut body, MI_INT32, &len_bytes, endian)?;

            let mut names = vec![0u8; name_len * field_names.len()];
            for (chunk, field) in names.chunks_mut(name_len).zip(field_names.iter()) {
                chunk[..field.len()].copy_from_slice(field.as_bytes());
            }
            push_element(&mut body, MI_INT8, &names, endian)?;

            for element in elements.iter() {
                if element.len() != field_names.len() {
                    return Err(MatError::InvalidShape(format!(
                        "struct element holds {} values for {} fields",
                        element.len(),
                        field_names.len()
                    )));
                }
                for value in element.iter() {
                    body.extend_from_slice(&encode_matrix("", value, endian)?);
                }
            }
        }
    }

    let mut out = Vec::with_capacity(body.len() + 8);
    push_u32(&mut out, MI_MATRIX, endian);
    push_u32(&mut out, len_u32(body.len())?, endian);
    out.extend_from_slice(&body);
    Ok(out)
}

fn push_element(out: &mut Vec<u8>, data_type: u32, data: &[u8], endian: Endian) -> Result<(), MatError> {
    push_u32(out, data_type, endian);
    push_u32(out, len_u32(data.len())?, endian);
    out.extend_from_slice(data);
    let padding = (8 - data.len() % 8) % 8;
    out.extend(std::iter::repeat(0u8).take(padding));
    Ok(())
}

fn push_u32(out: &mut Vec<u8>, value: u32, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&value.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&value.to_be_bytes()),
    }
}

fn len_u32(len: usize) -> Result<u32, MatError> {
    u32::try_from(len).map_err(|_| MatError::InvalidShape(format!("element of {len} bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::matlab::parser::{parse_mat_bytes, read_mat_file};

    fn sample_struct() -> MatArray {
        MatArray::Struct {
            dims: vec![1, 2],
            field_names: vec!["id".to_string(), "label".to_string()],
            elements: vec![
                vec![
                    MatArray::scalar(1.0),
                    MatArray::Char {
                        dims: vec![1, 4],
                        text: "left".to_string(),
                    },
                ],
                vec![
                    MatArray::scalar(2.0),
                    MatArray::Char {
                        dims: vec![1, 5],
                        text: "right".to_string(),
                    },
                ],
            ],
        }
    }

    #[test]
    fn test_every_layout_reads_back() -> Result<(), MatError> {
        let variables = vec![
            ("grid", MatArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])?),
            ("pair", sample_struct()),
            (
                "list",
                MatArray::Cell {
                    dims: vec![1, 2],
                    items: vec![MatArray::row(&[7.0, 8.0]), MatArray::row(&[])],
                },
            ),
        ];

        for endian in [Endian::Little, Endian::Big] {
            for compress in [false, true] {
                let bytes = encode_mat_bytes(&variables, MatWriteOptions { endian, compress })?;
                let decoded = parse_mat_bytes(&bytes)?;
                assert_eq!(decoded.len(), variables.len());
                for ((name, array), (expected_name, expected)) in
                    decoded.iter().zip(variables.iter())
                {
                    assert_eq!(name, expected_name);
                    assert_eq!(array, expected);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_uncompressed_layout_is_padded() -> Result<(), MatError> {
        let bytes = encode_mat_bytes(
            &[("v", MatArray::row(&[1.0]))],
            MatWriteOptions {
                endian: Endian::Little,
                compress: false,
            },
        )?;
        assert_eq!((bytes.len() - HEADER_LEN) % 8, 0);
        assert_eq!(&bytes[126..128], b"IM");
        Ok(())
    }

    #[test]
    fn test_write_mat_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vars.mat");
        write_mat_file(&path, &[("pair", sample_struct())], MatWriteOptions::default())?;
        let decoded = read_mat_file(&path)?;
        assert_eq!(decoded, vec![("pair".to_string(), sample_struct())]);
        Ok(())
    }

    #[test]
    fn test_struct_with_missing_value_is_rejected() {
        let broken = MatArray::Struct {
            dims: vec![1, 1],
            field_names: vec!["a".to_string(), "b".to_string()],
            elements: vec![vec![MatArray::scalar(1.0)]],
        };
        let res = encode_mat_bytes(&[("s", broken)], MatWriteOptions::default());
        assert!(matches!(res, Err(MatError::InvalidShape(_))));
    }
}
