use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;

use super::{Endian, MatArray, MatError};

/// Length of the MAT-file text header, subsystem offset, version and endian indicator.
pub(crate) const HEADER_LEN: usize = 128;

// data types of MAT-file data elements
pub(crate) const MI_INT8: u32 = 1;
pub(crate) const MI_UINT8: u32 = 2;
pub(crate) const MI_INT16: u32 = 3;
pub(crate) const MI_UINT16: u32 = 4;
pub(crate) const MI_INT32: u32 = 5;
pub(crate) const MI_UINT32: u32 = 6;
pub(crate) const MI_SINGLE: u32 = 7;
pub(crate) const MI_DOUBLE: u32 = 9;
pub(crate) const MI_INT64: u32 = 12;
pub(crate) const MI_UINT64: u32 = 13;
pub(crate) const MI_MATRIX: u32 = 14;
pub(crate) const MI_COMPRESSED: u32 = 15;
pub(crate) const MI_UTF8: u32 = 16;
pub(crate) const MI_UTF16: u32 = 17;

// array classes of miMATRIX elements
pub(crate) const MX_CELL_CLASS: u32 = 1;
pub(crate) const MX_STRUCT_CLASS: u32 = 2;
pub(crate) const MX_CHAR_CLASS: u32 = 4;
pub(crate) const MX_DOUBLE_CLASS: u32 = 6;
const MX_UINT64_CLASS: u32 = 15;

const FLAG_COMPLEX: u32 = 0x0800;

/// One data element: its type and a view of its payload.
struct Element<'a> {
    data_type: u32,
    data: &'a [u8],
}

/// Sequential reader over the bytes of a MAT-file or of a compound element.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self {
            buf,
            pos: 0,
            endian,
        }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MatError> {
        let end = self.pos.checked_add(len).ok_or(MatError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(MatError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, MatError> {
        let bytes = self.take(4)?;
        Ok(self.endian.u32_from(bytes))
    }

    /// Read the next data element, in normal or small format.
    fn read_element(&mut self) -> Result<Element<'a>, MatError> {
        let word = self.read_u32()?;

        // small data element: size in the upper 16 bits, payload in the next 4 bytes
        if word >> 16 != 0 {
            let data_type = word & 0xffff;
            let num_bytes = (word >> 16) as usize;
            let payload = self.take(4)?;
            let data = payload.get(..num_bytes).ok_or(MatError::Truncated)?;
            return Ok(Element { data_type, data });
        }

        let data_type = word;
        let num_bytes = self.read_u32()? as usize;
        let data = self.take(num_bytes)?;

        // compressed elements are not padded to 64-bit boundaries
        if data_type != MI_COMPRESSED {
            let padding = (8 - num_bytes % 8) % 8;
            let padding = padding.min(self.buf.len() - self.pos);
            self.pos += padding;
        }

        Ok(Element { data_type, data })
    }
}

/// Read all variables of a Level 5 MAT-file.
///
/// # Arguments
///
/// * `path` - The path to the `.mat` file.
///
/// # Returns
///
/// The top-level variables as (name, array) pairs in file order.
pub fn read_mat_file(path: impl AsRef<Path>) -> Result<Vec<(String, MatArray)>, MatError> {
    let bytes = std::fs::read(path)?;
    parse_mat_bytes(&bytes)
}

/// Parse all variables of a Level 5 MAT-file held in memory.
pub fn parse_mat_bytes(bytes: &[u8]) -> Result<Vec<(String, MatArray)>, MatError> {
    let endian = parse_header(bytes)?;
    let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);

    let mut variables = Vec::new();
    while !cursor.is_empty() {
        let element = cursor.read_element()?;
        match element.data_type {
            MI_MATRIX => variables.push(parse_matrix(element.data, endian)?),
            MI_COMPRESSED => {
                let mut decompressed = Vec::new();
                ZlibDecoder::new(element.data).read_to_end(&mut decompressed)?;
                let mut inner = Cursor::new(&decompressed, endian);
                let element = inner.read_element()?;
                if element.data_type != MI_MATRIX {
                    return Err(MatError::UnsupportedElement(format!(
                        "compressed element of type {}",
                        element.data_type
                    )));
                }
                variables.push(parse_matrix(element.data, endian)?);
            }
            other => log::debug!("Skipping top-level element of type {other}"),
        }
    }

    Ok(variables)
}

fn parse_header(bytes: &[u8]) -> Result<Endian, MatError> {
    if bytes.len() < HEADER_LEN {
        return Err(MatError::InvalidHeader(format!(
            "file holds {} bytes, the header alone needs {HEADER_LEN}",
            bytes.len()
        )));
    }

    let text = String::from_utf8_lossy(&bytes[..116]);
    if text.starts_with("MATLAB 7.3") {
        return Err(MatError::InvalidHeader(
            "MAT-file version 7.3 (HDF5) is not supported".to_string(),
        ));
    }

    match &bytes[126..128] {
        b"IM" => Ok(Endian::Little),
        b"MI" => Ok(Endian::Big),
        other => Err(MatError::InvalidHeader(format!(
            "unknown endian indicator {other:?}"
        ))),
    }
}

/// Parse the payload of an miMATRIX element into its name and array.
fn parse_matrix(data: &[u8], endian: Endian) -> Result<(String, MatArray), MatError> {
    // an empty miMATRIX is an empty array, typically an unset cell
    if data.is_empty() {
        return Ok((
            String::new(),
            MatArray::Numeric {
                dims: vec![0, 0],
                data: vec![],
            },
        ));
    }

    let mut cursor = Cursor::new(data, endian);

    let flags = cursor.read_element()?;
    let flags_word = to_u32_vec(&flags, endian)?
        .first()
        .copied()
        .ok_or(MatError::Truncated)?;
    let class = flags_word & 0xff;

    let dims = to_i32_vec(&cursor.read_element()?, endian)?
        .into_iter()
        .map(|d| usize::try_from(d).map_err(|_| MatError::InvalidShape(format!("dimension {d}"))))
        .collect::<Result<Vec<_>, _>>()?;
    let count = dims
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| MatError::InvalidShape(format!("dims {dims:?} overflow")))?;

    let name_element = cursor.read_element()?;
    let name = String::from_utf8_lossy(name_element.data).into_owned();

    let array = match class {
        MX_CELL_CLASS => {
            let items = (0..count)
                .map(|_| read_child(&mut cursor, endian))
                .collect::<Result<Vec<_>, _>>()?;
            MatArray::Cell { dims, items }
        }
        MX_STRUCT_CLASS => {
            let name_len_element = cursor.read_element()?;
            let name_len = to_i32_vec(&name_len_element, endian)?
                .first()
                .copied()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| MatError::InvalidShape("struct field name length".to_string()))?;
            let names_element = cursor.read_element()?;
            let field_names = names_element
                .data
                .chunks(name_len)
                .map(|chunk| {
                    let end = chunk.iter().position(|b| *b == 0).unwrap_or(chunk.len());
                    String::from_utf8_lossy(&chunk[..end]).into_owned()
                })
                .collect::<Vec<_>>();
            let elements = (0..count)
                .map(|_| {
                    field_names
                        .iter()
                        .map(|_| read_child(&mut cursor, endian))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            MatArray::Struct {
                dims,
                field_names,
                elements,
            }
        }
        MX_CHAR_CLASS => {
            let element = cursor.read_element()?;
            MatArray::Char {
                dims,
                text: decode_text(&element, endian)?,
            }
        }
        MX_DOUBLE_CLASS..=MX_UINT64_CLASS => {
            let real = cursor.read_element()?;
            if flags_word & FLAG_COMPLEX != 0 {
                log::warn!("Dropping the imaginary part of complex array {name:?}");
            }
            let data = to_f64_vec(&real, endian)?;
            if data.len() != count {
                return Err(MatError::InvalidShape(format!(
                    "array {name:?} of dims {dims:?} holds {} values",
                    data.len()
                )));
            }
            MatArray::Numeric { dims, data }
        }
        other => {
            return Err(MatError::UnsupportedElement(format!(
                "array {name:?} of class {other}"
            )))
        }
    };

    Ok((name, array))
}

fn read_child(cursor: &mut Cursor<'_>, endian: Endian) -> Result<MatArray, MatError> {
    let element = cursor.read_element()?;
    if element.data_type != MI_MATRIX {
        return Err(MatError::UnsupportedElement(format!(
            "expected a nested array, found element type {}",
            element.data_type
        )));
    }
    parse_matrix(element.data, endian).map(|(_, array)| array)
}

fn decode_text(element: &Element<'_>, endian: Endian) -> Result<String, MatError> {
    match element.data_type {
        MI_UTF8 | MI_UINT8 | MI_INT8 => Ok(String::from_utf8_lossy(element.data).into_owned()),
        MI_UINT16 | MI_UTF16 => {
            let units = element
                .data
                .chunks_exact(2)
                .map(|b| endian.u16_from(b))
                .collect::<Vec<_>>();
            Ok(String::from_utf16_lossy(&units))
        }
        other => Err(MatError::UnsupportedElement(format!(
            "char data of type {other}"
        ))),
    }
}

fn to_u32_vec(element: &Element<'_>, endian: Endian) -> Result<Vec<u32>, MatError> {
    match element.data_type {
        MI_UINT32 | MI_INT32 => Ok(element
            .data
            .chunks_exact(4)
            .map(|b| endian.u32_from(b))
            .collect()),
        other => Err(MatError::UnsupportedElement(format!(
            "array flags of type {other}"
        ))),
    }
}

fn to_i32_vec(element: &Element<'_>, endian: Endian) -> Result<Vec<i32>, MatError> {
    match element.data_type {
        MI_INT32 | MI_UINT32 => Ok(element
            .data
            .chunks_exact(4)
            .map(|b| endian.u32_from(b) as i32)
            .collect()),
        other => Err(MatError::UnsupportedElement(format!(
            "dimensions of type {other}"
        ))),
    }
}

fn to_f64_vec(element: &Element<'_>, endian: Endian) -> Result<Vec<f64>, MatError> {
    let data = element.data;
    let values = match element.data_type {
        MI_INT8 => data.iter().map(|b| *b as i8 as f64).collect(),
        MI_UINT8 => data.iter().map(|b| *b as f64).collect(),
        MI_INT16 => data
            .chunks_exact(2)
            .map(|b| endian.u16_from(b) as i16 as f64)
            .collect(),
        MI_UINT16 => data
            .chunks_exact(2)
            .map(|b| endian.u16_from(b) as f64)
            .collect(),
        MI_INT32 => data
            .chunks_exact(4)
            .map(|b| endian.u32_from(b) as i32 as f64)
            .collect(),
        MI_UINT32 => data
            .chunks_exact(4)
            .map(|b| endian.u32_from(b) as f64)
            .collect(),
        MI_SINGLE => data
            .chunks_exact(4)
            .map(|b| f32::from_bits(endian.u32_from(b)) as f64)
            .collect(),
        MI_DOUBLE => data
            .chunks_exact(8)
            .map(|b| f64::from_bits(endian.u64_from(b)))
            .collect(),
        MI_INT64 => data
            .chunks_exact(8)
            .map(|b| endian.u64_from(b) as i64 as f64)
            .collect(),
        MI_UINT64 => data
            .chunks_exact(8)
            .map(|b| endian.u64_from(b) as f64)
            .collect(),
        other => {
            return Err(MatError::UnsupportedElement(format!(
                "numeric data of type {other}"
            )))
        }
    };
    Ok(values)
}
