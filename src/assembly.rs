//! Dual triangle assembly
//!
//! Each bipolar Voronoi edge yields one triangle per dual Delaunay facet,
//! connecting the isosurface vertices of the facet's three Delaunay vertices.
//! Triangles are wound so their normal points from the higher toward the
//! lower scalar value.

use log::{debug, info, warn};

use crate::geometry::delaunay::Facet;
use crate::geometry::BoundingBox;
use crate::grid::ScalarGrid;
use crate::voronoi::edges::{sample_edge, EdgeGeometry, EdgeSample, VoronoiEdge};
use crate::voronoi::VoronoiDiagram;

/// Winding for the triangle dual to a facet
///
/// `f_owner` is the field value on the side of the facet's naming cell,
/// `f_other` the value across it. With positively oriented cells, facets with
/// an odd index have their vertex order `(i+1, i+2, i+3)` facing out of the
/// naming cell. Returns `true` when that order already faces toward the lower
/// value, `false` when two corners must be swapped.
pub fn facet_orientation(facet_index: usize, f_owner: f32, f_other: f32) -> bool {
    let owner_high = f_owner >= f_other;
    (facet_index % 2 == 1) == owner_high
}

/// Order corners per [`facet_orientation`]
pub fn orient_triangle(corners: [u32; 3], keep: bool) -> [u32; 3] {
    if keep {
        corners
    } else {
        [corners[0], corners[2], corners[1]]
    }
}

/// Field values on the naming-cell side and the far side of a facet
fn owner_side_values(
    diagram: &VoronoiDiagram,
    edge: &VoronoiEdge,
    sample: &EdgeSample,
    facet: Facet,
) -> (f32, f32) {
    let [near, far] = sample.values;
    match edge.geometry {
        EdgeGeometry::Segment { source, .. } => {
            if diagram.vertex_of_cell(facet.cell) == Some(source) {
                (near, far)
            } else {
                (far, near)
            }
        }
        EdgeGeometry::Ray { .. } => (near, far),
        EdgeGeometry::Line { direction, .. } => {
            // The entry point lies on the naming cell's side when the line runs outward
            if direction.dot(diagram.outward_normal(facet)) > 0.0 {
                (near, far)
            } else {
                (far, near)
            }
        }
    }
}

/// Shared assembly loop; `resolve(vertex, edge)` maps a Delaunay vertex to an
/// isosurface vertex for the given edge, or `None` to drop the triangle
fn assemble<F>(
    diagram: &VoronoiDiagram,
    grid: &ScalarGrid,
    bbox: &BoundingBox,
    isovalue: f32,
    resolve: F,
) -> Vec<[u32; 3]>
where
    F: Fn(usize, usize) -> Option<usize>,
{
    let tri = &diagram.triangulation;
    let mut triangles = Vec::new();
    let mut bipolar = 0;
    let mut dropped = 0;

    for (edge_id, edge) in diagram.edges.iter().enumerate() {
        let Some(sample) = sample_edge(edge, diagram, grid, bbox) else {
            continue;
        };
        if !sample.is_bipolar(isovalue) {
            continue;
        }
        bipolar += 1;

        for &facet in &edge.facets {
            let corners = tri.facet_vertices(facet);
            let resolved: Option<Vec<usize>> =
                corners.iter().map(|&v| resolve(v, edge_id)).collect();
            let Some(resolved) = resolved else {
                dropped += 1;
                continue;
            };

            let [a, b, c] = [resolved[0], resolved[1], resolved[2]];
            if a == b || b == c || a == c {
                warn!(
                    "degenerate triangle ({}, {}, {}) on edge {} skipped",
                    a, b, c, edge_id
                );
                continue;
            }

            let (f_owner, f_other) = owner_side_values(diagram, edge, &sample, facet);
            let keep = facet_orientation(facet.index, f_owner, f_other);
            triangles.push(orient_triangle([a as u32, b as u32, c as u32], keep));
        }
    }

    if dropped > 0 {
        debug!("{} dual facets had a corner without an isosurface vertex", dropped);
    }
    info!(
        "assembled {} triangles from {} bipolar edges",
        triangles.len(),
        bipolar
    );
    triangles
}

/// Triangles for single mode
///
/// `iso_vertex_of[v]` is the isosurface vertex of real Delaunay vertex (cube)
/// `v`, if the cube has one.
pub fn assemble_single(
    diagram: &VoronoiDiagram,
    grid: &ScalarGrid,
    bbox: &BoundingBox,
    isovalue: f32,
    iso_vertex_of: &[Option<usize>],
) -> Vec<[u32; 3]> {
    assemble(diagram, grid, bbox, isovalue, |vertex, _| {
        iso_vertex_of.get(vertex).copied().flatten()
    })
}

/// Triangles for multi mode, resolving each corner through the cell-edge rings
///
/// Facets touching a dummy vertex produce no triangle.
pub fn assemble_multi(
    diagram: &VoronoiDiagram,
    grid: &ScalarGrid,
    bbox: &BoundingBox,
    isovalue: f32,
) -> Vec<[u32; 3]> {
    let tri = &diagram.triangulation;
    assemble(diagram, grid, bbox, isovalue, |vertex, edge| {
        if tri.is_dummy(vertex) {
            return None;
        }
        let cell = diagram.cell_of_vertex(vertex)?;
        diagram.resolve_isovertex(cell, edge)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CellConstruction, IsovertexMode};
    use crate::geometry::delaunay::{LabeledPoint, Triangulation};
    use crate::geometry::triangle_normal;
    use glam::DVec3;

    /// Four cube centers in a 4x4x4 grid with field f = x
    fn ray_setup() -> (VoronoiDiagram, ScalarGrid, BoundingBox) {
        let grid = ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |p| p.x as f32);
        let points = [
            DVec3::new(0.5, 0.5, 0.5),
            DVec3::new(2.5, 0.5, 0.5),
            DVec3::new(0.5, 2.5, 0.5),
            DVec3::new(0.5, 0.5, 2.5),
        ];
        let labeled: Vec<LabeledPoint> = points.iter().map(|&p| LabeledPoint::real(p)).collect();
        let tri = Triangulation::build(&labeled).unwrap();
        let diagram = VoronoiDiagram::build(
            tri,
            &grid,
            IsovertexMode::Single,
            CellConstruction::DelaunayStar,
        )
        .unwrap();
        let bbox = BoundingBox::from_grid(&grid);
        (diagram, grid, bbox)
    }

    fn all_vertices() -> Vec<Option<usize>> {
        vec![Some(0), Some(1), Some(2), Some(3)]
    }

    #[test]
    fn test_orientation_rule() {
        assert!(facet_orientation(1, 2.0, 1.0));
        assert!(!facet_orientation(1, 1.0, 2.0));
        assert!(!facet_orientation(2, 2.0, 1.0));
        assert!(facet_orientation(2, 1.0, 2.0));
        assert_eq!(orient_triangle([1, 2, 3], false), [1, 3, 2]);
    }

    #[test]
    fn test_ray_edges_of_single_tetrahedron() {
        let (diagram, grid, bbox) = ray_setup();
        assert_eq!(diagram.vertices.len(), 1);
        assert!((diagram.vertices[0].value - 1.5).abs() < 1e-5);
        assert_eq!(diagram.edges.len(), 4);

        let mut ends: Vec<f32> = diagram
            .edges
            .iter()
            .map(|e| sample_edge(e, &diagram, &grid, &bbox).unwrap().values[1])
            .collect();
        ends.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected = [0.0, 1.5, 1.5, 3.0];
        for (got, want) in ends.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_clipped_ray_bipolar_emits_triangle() {
        let (diagram, grid, bbox) = ray_setup();
        // Only the -x ray ends below 1.0
        let triangles = assemble_single(&diagram, &grid, &bbox, 1.0, &all_vertices());
        assert_eq!(triangles.len(), 1);
        // Only the diagonal ray ends above 2.0
        let triangles = assemble_single(&diagram, &grid, &bbox, 2.0, &all_vertices());
        assert_eq!(triangles.len(), 1);
    }

    #[test]
    fn test_clipped_ray_same_side_emits_nothing() {
        let (diagram, grid, bbox) = ray_setup();
        assert!(assemble_single(&diagram, &grid, &bbox, 3.5, &all_vertices()).is_empty());
    }

    #[test]
    fn test_missing_isovertex_drops_triangle() {
        let (diagram, grid, bbox) = ray_setup();
        let partial = vec![Some(0), None, Some(2), Some(3)];
        // The -x ray's facet is x = 0.5: vertices 0, 2, 3, none missing
        assert_eq!(assemble_single(&diagram, &grid, &bbox, 1.0, &partial).len(), 1);
        // The diagonal ray's facet uses vertex 1
        assert!(assemble_single(&diagram, &grid, &bbox, 2.0, &partial).is_empty());
    }

    #[test]
    fn test_triangle_normal_points_toward_lower_values() {
        let (diagram, grid, bbox) = ray_setup();
        let positions: Vec<DVec3> = diagram.triangulation.points().iter().map(|p| p.position).collect();

        // f = x grows along +x: normals must have a negative x component
        for iso in [1.0, 2.0] {
            for [a, b, c] in assemble_single(&diagram, &grid, &bbox, iso, &all_vertices()) {
                let n = triangle_normal(
                    positions[a as usize],
                    positions[b as usize],
                    positions[c as usize],
                );
                assert!(n.x < 0.0, "normal {} at isovalue {}", n, iso);
            }
        }
    }
}
