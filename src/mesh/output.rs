//! OFF and PLY writers

use std::io::Write;

use crate::error::Result;
use crate::surface::IsoSurface;

/// Payload encoding for PLY output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyEncoding {
    #[default]
    Ascii,
    BinaryLittleEndian,
}

impl PlyEncoding {
    fn header_name(self) -> &'static str {
        match self {
            PlyEncoding::Ascii => "ascii",
            PlyEncoding::BinaryLittleEndian => "binary_little_endian",
        }
    }
}

/// Write the surface as an OFF file
pub fn write_off<W: Write>(surface: &IsoSurface, mut writer: W) -> Result<()> {
    writeln!(writer, "OFF")?;
    writeln!(
        writer,
        "{} {} 0",
        surface.vertex_count(),
        surface.triangle_count()
    )?;
    for v in &surface.vertices {
        writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
    }
    for [a, b, c] in &surface.triangles {
        writeln!(writer, "3 {} {} {}", a, b, c)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the surface as a PLY file
///
/// Faces are stored as `list uchar int`, the layout most viewers expect.
pub fn write_ply<W: Write>(
    surface: &IsoSurface,
    mut writer: W,
    encoding: PlyEncoding,
) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format {} 1.0", encoding.header_name())?;
    writeln!(writer, "element vertex {}", surface.vertex_count())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "element face {}", surface.triangle_count())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    match encoding {
        PlyEncoding::Ascii => {
            for v in &surface.vertices {
                writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
            }
            for [a, b, c] in &surface.triangles {
                writeln!(writer, "3 {} {} {}", a, b, c)?;
            }
        }
        PlyEncoding::BinaryLittleEndian => {
            for v in &surface.vertices {
                for component in [v.x, v.y, v.z] {
                    writer.write_all(&component.to_le_bytes())?;
                }
            }
            for triangle in &surface.triangles {
                writer.write_all(&[3u8])?;
                for &index in triangle {
                    writer.write_all(&(index as i32).to_le_bytes())?;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}
