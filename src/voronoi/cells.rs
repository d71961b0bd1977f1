//! Voronoi cells of real Delaunay vertices
//!
//! Two constructions are available. The Delaunay-star walk produces one
//! polygonal facet per Delaunay edge leaving the site, with vertices in
//! rotational order; it is exact because it never leaves the combinatorics of
//! the triangulation. The convex-hull construction recomputes the cell from
//! its vertex positions and yields triangulated facets.

use glam::Vec3;
use log::debug;
use parry3d::math::Point;
use parry3d::transformation;

use super::VoronoiDiagram;
use crate::config::CellConstruction;
use crate::error::{Result, VoronoiError};
use crate::geometry::{collinear, orient3d};
use crate::isovertex::Cycle;
use crate::spatial::SpatialIndex;

/// One face of a Voronoi cell
#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiFacet {
    /// Voronoi vertex ids around the face, in cyclic order
    pub vertices: Vec<usize>,
    /// Scalar values of `vertices`, same order
    pub values: Vec<f32>,
    /// Delaunay vertex on the other side of the face, when known
    pub neighbor: Option<usize>,
}

/// Bounded Voronoi cell of one real Delaunay vertex
#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiCell {
    /// Delaunay vertex (equal to the active cube index)
    pub site: usize,
    /// Distinct Voronoi vertex ids of the cell, ascending
    pub vertices: Vec<usize>,
    pub facets: Vec<VoronoiFacet>,
    /// First isosurface vertex owned by this cell
    pub iso_start: usize,
    /// Number of isosurface vertices (one per cycle)
    pub num_iso: usize,
    pub cycles: Vec<Cycle>,
}

impl VoronoiCell {
    fn new(site: usize, vertices: Vec<usize>, facets: Vec<VoronoiFacet>) -> Self {
        Self {
            site,
            vertices,
            facets,
            iso_start: 0,
            num_iso: 0,
            cycles: Vec::new(),
        }
    }
}

/// Build cells for every real vertex, in vertex order
pub(super) fn build_cells(
    diagram: &VoronoiDiagram,
    construction: CellConstruction,
) -> Result<Vec<VoronoiCell>> {
    let tri = &diagram.triangulation;
    let mut cells = Vec::new();

    for site in 0..tri.num_vertices() {
        if tri.is_dummy(site) {
            continue;
        }
        let cell = match construction {
            CellConstruction::DelaunayStar => star_cell(diagram, site)?,
            CellConstruction::ConvexHull => hull_cell(diagram, site)?,
        };
        cells.push(cell);
    }

    debug!(
        "built {} Voronoi cells ({} facets)",
        cells.len(),
        cells.iter().map(|c| c.facets.len()).sum::<usize>()
    );
    Ok(cells)
}

/// Voronoi vertex ids of the finite cells around `site`
fn cell_vertex_ids(diagram: &VoronoiDiagram, site: usize) -> Result<(Vec<usize>, Vec<usize>)> {
    let tri = &diagram.triangulation;
    let incident = tri.incident_cells(site);

    let mut ids = Vec::with_capacity(incident.len());
    for &c in &incident {
        match diagram.vertex_of_cell(c) {
            Some(id) => ids.push(id),
            None => {
                return Err(VoronoiError::Degenerate(format!(
                    "Voronoi cell of vertex {} is unbounded",
                    site
                )))
            }
        }
    }
    ids.sort_unstable();
    ids.dedup();
    Ok((ids, incident))
}

fn make_facet(diagram: &VoronoiDiagram, vertices: Vec<usize>, neighbor: Option<usize>) -> VoronoiFacet {
    let values = vertices.iter().map(|&v| diagram.vertices[v].value).collect();
    VoronoiFacet {
        vertices,
        values,
        neighbor,
    }
}

fn star_cell(diagram: &VoronoiDiagram, site: usize) -> Result<VoronoiCell> {
    let tri = &diagram.triangulation;
    let (vertices, incident) = cell_vertex_ids(diagram, site)?;

    let mut facets = Vec::new();
    for neighbor in tri.adjacent_vertices(site) {
        let start = incident
            .iter()
            .copied()
            .find(|&c| tri.cell_vertices(c).contains(&neighbor));
        let Some(start) = start else { continue };

        let mut ring: Vec<usize> = Vec::new();
        for c in tri.edge_star(start, site, neighbor)? {
            let id = diagram.vertex_of_cell(c).ok_or_else(|| {
                VoronoiError::Degenerate(format!("Voronoi cell of vertex {} is unbounded", site))
            })?;
            if ring.last() != Some(&id) {
                ring.push(id);
            }
        }
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        if ring.len() >= 3 {
            facets.push(make_facet(diagram, ring, Some(neighbor)));
        }
    }

    Ok(VoronoiCell::new(site, vertices, facets))
}

fn hull_cell(diagram: &VoronoiDiagram, site: usize) -> Result<VoronoiCell> {
    let (vertices, _) = cell_vertex_ids(diagram, site)?;
    let positions: Vec<_> = vertices.iter().map(|&v| diagram.vertices[v].position).collect();

    if positions.len() < 4 || !spans_volume(&positions) {
        return Err(VoronoiError::Degenerate(format!(
            "Voronoi cell of vertex {} has {} vertices spanning no volume",
            site,
            positions.len()
        )));
    }

    let points: Vec<Point<f32>> = positions
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();
    let (hull_points, triangles) = transformation::try_convex_hull(&points).map_err(|e| {
        VoronoiError::Degenerate(format!("convex hull of cell {} failed: {:?}", site, e))
    })?;

    let lookup = SpatialIndex::with_ids(
        &positions.iter().map(|p| p.as_vec3()).collect::<Vec<Vec3>>(),
        vertices.clone(),
    );
    let hull_ids: Vec<usize> = hull_points
        .iter()
        .map(|p| lookup.find_nearest(Vec3::new(p.x, p.y, p.z)))
        .collect();

    let facets = triangles
        .iter()
        .filter_map(|tri| {
            let ids = tri.map(|i| hull_ids[i as usize]);
            (ids[0] != ids[1] && ids[1] != ids[2] && ids[0] != ids[2])
                .then(|| make_facet(diagram, ids.to_vec(), None))
        })
        .collect();

    Ok(VoronoiCell::new(site, vertices, facets))
}

/// Whether a point set contains four affinely independent points
fn spans_volume(points: &[glam::DVec3]) -> bool {
    let Some(&a) = points.first() else { return false };
    let Some(&b) = points.iter().find(|&&p| p != a) else { return false };
    let Some(&c) = points.iter().find(|&&p| !collinear(a, b, p)) else { return false };
    points.iter().any(|&d| orient3d(a, b, c, d) != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_spans_volume() {
        let flat = vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::ONE.with_z(0.0)];
        assert!(!spans_volume(&flat));
        let solid = vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z];
        assert!(spans_volume(&solid));
    }
}
