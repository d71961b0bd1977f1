//! Diagnostic dumps of a Voronoi diagram
//!
//! The CSV is meant for external plotting: a vertex table followed by an edge
//! table in which unbounded edges appear as their clipped segments. The log is
//! a plain listing for reading by eye.

use std::io::Write;

use crate::error::Result;
use crate::geometry::BoundingBox;
use crate::voronoi::{EdgeGeometry, VoronoiDiagram};

/// Write vertices then edges as two CSV sections
///
/// Rays and lines that miss `bbox` are left out of the edge table.
pub fn write_voronoi_csv<W: Write>(
    diagram: &VoronoiDiagram,
    bbox: &BoundingBox,
    mut writer: W,
) -> Result<()> {
    writeln!(writer, "# vertices")?;
    writeln!(writer, "id,x,y,z,value")?;
    for (id, v) in diagram.vertices.iter().enumerate() {
        let p = v.position;
        writeln!(writer, "{},{},{},{},{}", id, p.x, p.y, p.z, v.value)?;
    }

    writeln!(writer, "# edges")?;
    writeln!(writer, "id,kind,x1,y1,z1,x2,y2,z2")?;
    for (id, edge) in diagram.edges.iter().enumerate() {
        let (kind, ends) = match edge.geometry {
            EdgeGeometry::Segment { source, target } => (
                "segment",
                Some((
                    diagram.vertices[source].position,
                    diagram.vertices[target].position,
                )),
            ),
            EdgeGeometry::Ray { source, direction } => (
                "ray",
                bbox.clip_ray(diagram.vertices[source].position, direction),
            ),
            EdgeGeometry::Line { point, direction } => ("line", bbox.clip_line(point, direction)),
        };
        if let Some((a, b)) = ends {
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{}",
                id, kind, a.x, a.y, a.z, b.x, b.y, b.z
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Human-readable listing of vertices, edges and cells
pub fn write_voronoi_log<W: Write>(diagram: &VoronoiDiagram, mut writer: W) -> Result<()> {
    let tri = &diagram.triangulation;
    writeln!(
        writer,
        "Delaunay triangulation: {} vertices, {} finite cells",
        tri.num_vertices(),
        tri.finite_cells().count()
    )?;
    writeln!(
        writer,
        "Voronoi diagram: {} vertices, {} edges, {} cells",
        diagram.vertices.len(),
        diagram.edges.len(),
        diagram.cells.len()
    )?;

    writeln!(writer, "\nVertices:")?;
    for (id, v) in diagram.vertices.iter().enumerate() {
        writeln!(writer, "  [{}] {} value {}", id, v.position, v.value)?;
    }

    writeln!(writer, "\nEdges:")?;
    for (id, edge) in diagram.edges.iter().enumerate() {
        match edge.geometry {
            EdgeGeometry::Segment { source, target } => {
                write!(writer, "  [{}] Segment {} -> {}", id, source, target)?
            }
            EdgeGeometry::Ray { source, direction } => {
                write!(writer, "  [{}] Ray from {} along {}", id, source, direction)?
            }
            EdgeGeometry::Line { point, direction } => {
                write!(writer, "  [{}] Line through {} along {}", id, point, direction)?
            }
        }
        writeln!(writer, " ({} facets)", edge.facets.len())?;
    }

    if !diagram.cells.is_empty() {
        writeln!(writer, "\nCells:")?;
        for (id, cell) in diagram.cells.iter().enumerate() {
            writeln!(
                writer,
                "  [{}] site {} at {}: {} vertices, {} facets, isosurface vertices {}..{}",
                id,
                cell.site,
                tri.position(cell.site),
                cell.vertices.len(),
                cell.facets.len(),
                cell.iso_start,
                cell.iso_start + cell.num_iso
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CellConstruction, IsovertexMode};
    use crate::geometry::delaunay::{LabeledPoint, Triangulation};
    use crate::grid::ScalarGrid;
    use glam::DVec3;

    fn diagram(mode: IsovertexMode) -> (VoronoiDiagram, BoundingBox) {
        let grid = ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |p| p.x as f32);
        let points: Vec<LabeledPoint> = [
            DVec3::new(0.5, 0.5, 0.5),
            DVec3::new(2.5, 0.5, 0.5),
            DVec3::new(0.5, 2.5, 0.5),
            DVec3::new(0.5, 0.5, 2.5),
        ]
        .iter()
        .map(|&p| LabeledPoint::real(p))
        .collect();
        let tri = Triangulation::build(&points).unwrap();
        let diagram =
            VoronoiDiagram::build(tri, &grid, mode, CellConstruction::DelaunayStar).unwrap();
        (diagram, BoundingBox::from_grid(&grid))
    }

    #[test]
    fn test_csv_sections() {
        let (diagram, bbox) = diagram(IsovertexMode::Single);
        let mut buf = Vec::new();
        write_voronoi_csv(&diagram, &bbox, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# vertices");
        assert_eq!(lines[1], "id,x,y,z,value");
        let vertex: Vec<f64> = lines[2].split(',').map(|f| f.parse().unwrap()).collect();
        assert_eq!(vertex.len(), 5);
        for value in &vertex[1..] {
            assert!((value - 1.5).abs() < 1e-5);
        }
        assert_eq!(lines[3], "# edges");
        // Every ray from the inner vertex reaches the box
        let rays: Vec<&&str> = lines[5..].iter().filter(|l| l.contains(",ray,")).collect();
        assert_eq!(rays.len(), 4);
        for row in rays {
            assert_eq!(row.split(',').count(), 8);
        }
    }

    #[test]
    fn test_log_lists_everything() {
        let (diagram, _) = diagram(IsovertexMode::Single);
        let mut buf = Vec::new();
        write_voronoi_log(&diagram, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Voronoi diagram: 1 vertices, 4 edges, 0 cells"));
        assert_eq!(text.matches("Ray from 0").count(), 4);
        assert!(!text.contains("Cells:"));
    }
}
