//! Voronoi edge geometry and bipolar classification

use glam::DVec3;

use super::VoronoiDiagram;
use crate::geometry::delaunay::Facet;
use crate::geometry::BoundingBox;
use crate::grid::ScalarGrid;

/// Shape of a Voronoi edge
///
/// Resolved once when the edge is created; consumers match on it instead of
/// re-deriving it from the triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeGeometry {
    /// Finite edge between two Voronoi vertices (`source < target`)
    Segment { source: usize, target: usize },
    /// Half-infinite edge leaving a Voronoi vertex along a unit direction
    Ray { source: usize, direction: DVec3 },
    /// Edge unbounded in both directions
    Line { point: DVec3, direction: DVec3 },
}

/// A deduplicated Voronoi edge and the Delaunay facets dual to it
#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiEdge {
    pub geometry: EdgeGeometry,
    /// Facets sharing this dual edge, each named from a finite cell
    pub facets: Vec<Facet>,
}

impl VoronoiEdge {
    pub fn is_segment(&self) -> bool {
        matches!(self.geometry, EdgeGeometry::Segment { .. })
    }
}

/// Endpoints of an edge restricted to the sampled domain, with field values
///
/// Index 0 is the source side: the segment source, the ray source, or the
/// line's entry point into the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSample {
    pub points: [DVec3; 2],
    pub values: [f32; 2],
}

impl EdgeSample {
    pub fn is_bipolar(&self, isovalue: f32) -> bool {
        is_bipolar(self.values[0], self.values[1], isovalue)
    }
}

/// Whether `a` and `b` lie strictly on opposite sides of the isovalue
pub fn is_bipolar(a: f32, b: f32, isovalue: f32) -> bool {
    (a < isovalue && b > isovalue) || (a > isovalue && b < isovalue)
}

/// Inclusive crossing test used on cube edges
///
/// A sample exactly at the isovalue counts as crossing when the other sample
/// is strictly on either side.
pub fn crosses_inclusive(a: f32, b: f32, isovalue: f32) -> bool {
    (a > isovalue && b <= isovalue)
        || (a >= isovalue && b < isovalue)
        || (a < isovalue && b >= isovalue)
        || (a <= isovalue && b > isovalue)
}

/// Evaluate an edge against the field
///
/// Unbounded edges are clipped to `bbox`; clipped endpoints are clamped into
/// the grid before interpolation. Returns `None` when the edge misses the box.
pub fn sample_edge(
    edge: &VoronoiEdge,
    diagram: &VoronoiDiagram,
    grid: &ScalarGrid,
    bbox: &BoundingBox,
) -> Option<EdgeSample> {
    match edge.geometry {
        EdgeGeometry::Segment { source, target } => {
            let (a, b) = (&diagram.vertices[source], &diagram.vertices[target]);
            Some(EdgeSample {
                points: [a.position, b.position],
                values: [a.value, b.value],
            })
        }
        EdgeGeometry::Ray { source, direction } => {
            let start = &diagram.vertices[source];
            let (_, end) = bbox.clip_ray(start.position, direction)?;
            let end = grid.clamp(end);
            Some(EdgeSample {
                points: [start.position, end],
                values: [start.value, grid.trilinear(end)],
            })
        }
        EdgeGeometry::Line { point, direction } => {
            let (entry, exit) = bbox.clip_line(point, direction)?;
            let (entry, exit) = (grid.clamp(entry), grid.clamp(exit));
            Some(EdgeSample {
                points: [entry, exit],
                values: [grid.trilinear(entry), grid.trilinear(exit)],
            })
        }
    }
}
