//! Mesh file output
//!
//! Writes an [`IsoSurface`] as OFF or PLY. Writers take any `Write`, so the
//! same code serves files and in-memory buffers.

mod output;

pub use output::{write_off, write_ply, PlyEncoding};

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use log::info;

use crate::error::{Result, VoronoiError};
use crate::surface::IsoSurface;

/// Supported mesh file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Off,
    Ply,
}

impl FromStr for MeshFormat {
    type Err = VoronoiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(MeshFormat::Off),
            "ply" => Ok(MeshFormat::Ply),
            other => Err(VoronoiError::UnsupportedFormat(format!(
                "'{}' (expected off or ply)",
                other
            ))),
        }
    }
}

/// Write `surface` to `path`
///
/// `encoding` only applies to PLY.
pub fn write_mesh<P: AsRef<Path>>(
    surface: &IsoSurface,
    path: P,
    format: MeshFormat,
    encoding: PlyEncoding,
) -> Result<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(File::create(path)?);
    match format {
        MeshFormat::Off => write_off(surface, writer)?,
        MeshFormat::Ply => write_ply(surface, writer, encoding)?,
    }
    info!(
        "wrote {} vertices, {} triangles to {}",
        surface.vertex_count(),
        surface.triangle_count(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_mesh_format_from_str() {
        assert_eq!("off".parse::<MeshFormat>().unwrap(), MeshFormat::Off);
        assert_eq!("PLY".parse::<MeshFormat>().unwrap(), MeshFormat::Ply);
        assert!(matches!(
            "obj".parse::<MeshFormat>(),
            Err(VoronoiError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_write_mesh_to_file() {
        let surface = IsoSurface {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            triangles: vec![[0, 1, 2]],
        };
        let path = std::env::temp_dir().join(format!("vdc_mesh_test_{}.off", std::process::id()));
        write_mesh(&surface, &path, MeshFormat::Off, PlyEncoding::Ascii).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(text.starts_with("OFF\n3 1 0\n"));
    }
}
