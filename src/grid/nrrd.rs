//! NRRD volume loader
//!
//! Reads the subset of the NRRD format used for scalar volumes: a text header
//! terminated by a blank line, followed by (or pointing at, via `data file`)
//! a raw sample payload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::DVec3;
use log::{debug, info};

use super::ScalarGrid;
use crate::error::{Result, VoronoiError};

/// Scalar element types accepted in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float,
    Double,
    UChar,
    Char,
    Short,
    UShort,
    Int,
    UInt,
}

impl ElementType {
    /// Parse an NRRD type name, including its common aliases
    pub fn parse(name: &str) -> Result<Self> {
        let ty = match name.trim() {
            "float" => ElementType::Float,
            "double" => ElementType::Double,
            "uchar" | "unsigned char" | "uint8" | "uint8_t" => ElementType::UChar,
            "signed char" | "char" | "int8" | "int8_t" => ElementType::Char,
            "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => {
                ElementType::Short
            }
            "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
                ElementType::UShort
            }
            "int" | "signed int" | "int32" | "int32_t" => ElementType::Int,
            "uint" | "unsigned int" | "uint32" | "uint32_t" => ElementType::UInt,
            other => return Err(VoronoiError::UnsupportedElementType(other.to_string())),
        };
        Ok(ty)
    }

    /// Size of one sample in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::UChar | ElementType::Char => 1,
            ElementType::Short | ElementType::UShort => 2,
            ElementType::Float | ElementType::Int | ElementType::UInt => 4,
            ElementType::Double => 8,
        }
    }

    fn decode(self, bytes: &[u8], little_endian: bool) -> f32 {
        macro_rules! read {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&bytes[..$n]);
                if little_endian {
                    <$t>::from_le_bytes(buf)
                } else {
                    <$t>::from_be_bytes(buf)
                }
            }};
        }
        match self {
            ElementType::Float => read!(f32, 4),
            ElementType::Double => read!(f64, 8) as f32,
            ElementType::UChar => bytes[0] as f32,
            ElementType::Char => bytes[0] as i8 as f32,
            ElementType::Short => read!(i16, 2) as f32,
            ElementType::UShort => read!(u16, 2) as f32,
            ElementType::Int => read!(i32, 4) as f32,
            ElementType::UInt => read!(u32, 4) as f32,
        }
    }
}

/// Parsed header fields of an NRRD file
#[derive(Debug, Clone, PartialEq)]
pub struct NrrdHeader {
    pub element_type: ElementType,
    pub sizes: [usize; 3],
    pub spacing: DVec3,
    pub origin: DVec3,
    pub little_endian: bool,
    /// Detached payload, relative paths resolved against the header's directory
    pub data_file: Option<PathBuf>,
}

/// Load a 3D scalar volume from an NRRD file
///
/// # Arguments
///
/// * `path` - Header file; a `data file` field points at a detached payload,
///   resolved relative to this file's directory
///
/// # Returns
///
/// The samples converted to `f32`, laid out x-fastest, with spacing taken from
/// `spacings` or `space directions` and origin from `space origin`.
///
/// # Errors
///
/// `Parse` for a malformed header or a payload shorter than the sizes demand,
/// `UnsupportedElementType` / `UnsupportedFormat` for types and encodings
/// other than raw scalars, and `Io` when a file cannot be read.
///
/// # Performance
///
/// The whole file is read into memory once; decoding is a single pass.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ScalarGrid> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let (fields, payload_offset) = split_header(&bytes)?;
    let header = parse_header(&fields, path.parent())?;

    let payload: Vec<u8> = match &header.data_file {
        Some(file) => fs::read(file)?,
        None => bytes[payload_offset..].to_vec(),
    };

    let grid = decode_payload(&header, &payload)?;
    info!(
        "loaded {} ({}x{}x{} {:?} samples)",
        path.display(),
        grid.nx,
        grid.ny,
        grid.nz,
        header.element_type
    );
    Ok(grid)
}

/// Split the file into `key: value` header fields and the payload offset
fn split_header(bytes: &[u8]) -> Result<(HashMap<String, String>, usize)> {
    if !bytes.starts_with(b"NRRD") {
        return Err(VoronoiError::Parse("missing NRRD magic".to_string()));
    }

    let mut fields = HashMap::new();
    let mut offset = 0;
    let mut first = true;

    loop {
        let rest = &bytes[offset..];
        let line_end = match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => {
                // Header without a payload separator: everything is header
                offset = bytes.len();
                break;
            }
        };
        let line = String::from_utf8_lossy(&rest[..line_end]);
        let line = line.trim_end_matches('\r');
        offset += line_end + 1;

        if first {
            first = false;
            continue;
        }
        if line.is_empty() {
            break;
        }
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(": ") {
            fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        } else if !line.contains(":=") {
            return Err(VoronoiError::Parse(format!("malformed header line '{}'", line)));
        }
    }

    Ok((fields, offset))
}

fn parse_header(fields: &HashMap<String, String>, base_dir: Option<&Path>) -> Result<NrrdHeader> {
    let field = |key: &str| {
        fields
            .get(key)
            .ok_or_else(|| VoronoiError::Parse(format!("missing '{}' field", key)))
    };

    let element_type = ElementType::parse(field("type")?)?;

    let dimension: usize = field("dimension")?
        .parse()
        .map_err(|_| VoronoiError::Parse("invalid dimension".to_string()))?;
    if dimension != 3 {
        return Err(VoronoiError::Parse(format!(
            "expected a 3D volume, got dimension {}",
            dimension
        )));
    }

    let sizes = parse_numbers::<usize>(field("sizes")?, "sizes")?;
    if sizes.len() != 3 {
        return Err(VoronoiError::Parse(format!(
            "expected 3 sizes, got {}",
            sizes.len()
        )));
    }

    let encoding = fields.get("encoding").map(String::as_str).unwrap_or("raw");
    if encoding != "raw" {
        return Err(VoronoiError::UnsupportedFormat(format!(
            "NRRD encoding '{}'",
            encoding
        )));
    }

    let little_endian = match fields.get("endian").map(String::as_str) {
        None | Some("little") => true,
        Some("big") => false,
        Some(other) => return Err(VoronoiError::Parse(format!("unknown endian '{}'", other))),
    };

    let spacing = if let Some(spacings) = fields.get("spacings") {
        let values = parse_numbers::<f64>(spacings, "spacings")?;
        vector_or_default(&values, 1.0)
    } else if let Some(directions) = fields.get("space directions") {
        let vectors = parse_tuples(directions)?;
        let lengths: Vec<f64> = vectors.iter().map(|v| v.length()).collect();
        vector_or_default(&lengths, 1.0)
    } else {
        DVec3::ONE
    };

    let origin = match fields.get("space origin") {
        Some(text) => parse_tuples(text)?.first().copied().unwrap_or(DVec3::ZERO),
        None => DVec3::ZERO,
    };

    let data_file = fields
        .get("data file")
        .or_else(|| fields.get("datafile"))
        .map(|name| match base_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        });

    debug!(
        "NRRD header: type {:?}, sizes {:?}, spacing {}, origin {}",
        element_type, sizes, spacing, origin
    );

    Ok(NrrdHeader {
        element_type,
        sizes: [sizes[0], sizes[1], sizes[2]],
        spacing,
        origin,
        little_endian,
        data_file,
    })
}

fn decode_payload(header: &NrrdHeader, payload: &[u8]) -> Result<ScalarGrid> {
    let size = header.element_type.size();
    let bytes = header
        .sizes
        .iter()
        .try_fold(size, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| {
            VoronoiError::Parse(format!(
                "sizes {:?} of {}-byte samples overflow the payload length",
                header.sizes, size
            ))
        })?;
    if payload.len() < bytes {
        return Err(VoronoiError::Parse(format!(
            "payload holds {} bytes, expected {}",
            payload.len(),
            bytes
        )));
    }

    let data = payload[..bytes]
        .chunks_exact(size)
        .map(|chunk| header.element_type.decode(chunk, header.little_endian))
        .collect();

    ScalarGrid::from_data(header.sizes, header.spacing, header.origin, data)
}

fn parse_numbers<T: std::str::FromStr>(text: &str, what: &str) -> Result<Vec<T>> {
    text.split_whitespace()
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| VoronoiError::Parse(format!("invalid {} entry '{}'", what, s)))
        })
        .collect()
}

/// Parse vectors written as `(x,y,z) (x,y,z) ...`; `none` entries are skipped
fn parse_tuples(text: &str) -> Result<Vec<DVec3>> {
    let mut vectors = Vec::new();
    for token in text.split(')') {
        let token = token.trim();
        if token.is_empty() || token == "none" {
            continue;
        }
        let inner = token.trim_start_matches("none").trim().trim_start_matches('(');
        let parts = inner
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| VoronoiError::Parse(format!("invalid vector '{}'", token)))
            })
            .collect::<Result<Vec<f64>>>()?;
        if parts.len() != 3 {
            return Err(VoronoiError::Parse(format!("expected 3D vector, got '{}'", token)));
        }
        vectors.push(DVec3::new(parts[0], parts[1], parts[2]));
    }
    Ok(vectors)
}

/// Use the first three finite positive values, falling back to `default`
fn vector_or_default(values: &[f64], default: f64) -> DVec3 {
    let pick = |i: usize| {
        values
            .get(i)
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(default)
    };
    DVec3::new(pick(0), pick(1), pick(2))
}
