//! Voronoi diagram dual to a Delaunay triangulation
//!
//! [`VoronoiDiagram`] is the single aggregate built from a triangulation and
//! passed by reference through placement and assembly. Everything inside it is
//! addressed by integer index:
//!
//! - vertices: one per group of finite Delaunay cells sharing a circumsphere
//! - edges: one per pair of adjacent groups, each listing its dual facets
//! - cells (multi mode): one per real Delaunay vertex
//! - cell edges (multi mode): circular lists of the cells around each edge

pub mod cell_edges;
pub mod cells;
pub mod edges;

use std::collections::HashMap;

use glam::DVec3;
use log::{debug, info, warn};

pub use cell_edges::{CellEdge, CellEdgeGraph};
pub use cells::{VoronoiCell, VoronoiFacet};
pub use edges::{EdgeGeometry, EdgeSample, VoronoiEdge};

use crate::config::{CellConstruction, IsovertexMode};
use crate::error::Result;
use crate::geometry::delaunay::{Facet, Triangulation};
use crate::geometry::triangle_normal;
use crate::grid::ScalarGrid;

/// A Voronoi vertex with its cached field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoronoiVertex {
    pub position: DVec3,
    pub value: f32,
}

/// Voronoi diagram with optional cell structure
#[derive(Debug, Clone)]
pub struct VoronoiDiagram {
    pub triangulation: Triangulation,
    pub vertices: Vec<VoronoiVertex>,
    pub edges: Vec<VoronoiEdge>,
    pub cells: Vec<VoronoiCell>,
    pub cell_edges: CellEdgeGraph,
    /// Group id of every Delaunay cell; ids below `vertices.len()` are vertices
    group_of_cell: Vec<usize>,
    cell_of_vertex: Vec<Option<usize>>,
    edge_of_vertex_pair: HashMap<(usize, usize), usize>,
}

/// Union-find over cell indices
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the smaller index as root so group order follows cell order
            let (lo, hi) = (ra.min(rb), ra.max(rb));
            self.parent[hi] = lo;
        }
    }
}

impl VoronoiDiagram {
    /// Build vertices and edges, plus cells and the cell-edge graph in multi mode
    ///
    /// # Arguments
    ///
    /// * `triangulation` - Delaunay triangulation of the active cube centers;
    ///   the diagram takes ownership
    /// * `grid` - Field sampled at every Voronoi vertex
    /// * `mode` - Cells and cell edges are only built in multi mode
    /// * `construction` - How cell facets are derived
    ///
    /// # Performance
    ///
    /// Grouping uses a union-find over cells and is near linear in the number
    /// of Delaunay cells. Cell construction walks each real vertex's edge stars
    /// once.
    ///
    /// # Errors
    ///
    /// Returns `Degenerate` when a real vertex has an unbounded cell or a cell
    /// cannot be constructed.
    pub fn build(
        triangulation: Triangulation,
        grid: &ScalarGrid,
        mode: IsovertexMode,
        construction: CellConstruction,
    ) -> Result<Self> {
        let mut diagram = VoronoiDiagram {
            triangulation,
            vertices: Vec::new(),
            edges: Vec::new(),
            cells: Vec::new(),
            cell_edges: CellEdgeGraph::default(),
            group_of_cell: Vec::new(),
            cell_of_vertex: Vec::new(),
            edge_of_vertex_pair: HashMap::new(),
        };

        diagram.build_vertices(grid);
        diagram.build_edges();

        if mode == IsovertexMode::Multi {
            diagram.cells = cells::build_cells(&diagram, construction)?;
            diagram.cell_of_vertex = vec![None; diagram.triangulation.num_vertices()];
            for (id, cell) in diagram.cells.iter().enumerate() {
                diagram.cell_of_vertex[cell.site] = Some(id);
            }
            diagram.cell_edges = CellEdgeGraph::build(
                &diagram.edges,
                &diagram.triangulation,
                &diagram.cell_of_vertex,
            );
        }

        info!(
            "Voronoi diagram: {} vertices, {} edges, {} cells, {} cell edges",
            diagram.vertices.len(),
            diagram.edges.len(),
            diagram.cells.len(),
            diagram.cell_edges.len()
        );
        Ok(diagram)
    }

    /// Group cospherical finite cells into vertices and coplanar hull cells into
    /// shared unbounded regions
    fn build_vertices(&mut self, grid: &ScalarGrid) {
        let tri = &self.triangulation;
        let mut sets = DisjointSets::new(tri.num_cells());

        for facet in tri.finite_facets() {
            let mirror = tri.mirror(facet);
            if !tri.is_infinite(mirror.cell) && tri.is_cospherical(facet) {
                sets.union(facet.cell, mirror.cell);
            }
        }
        for c in 0..tri.num_cells() {
            if !tri.is_infinite(c) {
                continue;
            }
            for i in 1..4 {
                let n = tri.neighbor(c, i);
                if c < n && tri.hull_faces_coplanar(c, n) {
                    sets.union(c, n);
                }
            }
        }

        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        let mut group_of_cell = vec![0; tri.num_cells()];

        for c in tri.finite_cells() {
            let root = sets.find(c);
            let next = self.vertices.len();
            let group = *group_of_root.entry(root).or_insert(next);
            if group == next {
                let position = tri.circumcenter(c);
                self.vertices.push(VoronoiVertex {
                    position,
                    value: grid.trilinear(position),
                });
            }
            group_of_cell[c] = group;
        }

        let mut next_unbounded = self.vertices.len();
        for c in 0..tri.num_cells() {
            if !tri.is_infinite(c) {
                continue;
            }
            let root = sets.find(c);
            let group = *group_of_root.entry(root).or_insert_with(|| {
                next_unbounded += 1;
                next_unbounded - 1
            });
            group_of_cell[c] = group;
        }

        self.group_of_cell = group_of_cell;
    }

    /// One edge per pair of adjacent groups
    fn build_edges(&mut self) {
        let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();
        let mut degenerate = 0;

        for facet in self.triangulation.finite_facets() {
            let mirror = self.triangulation.mirror(facet);
            let g1 = self.group_of_cell[facet.cell];
            let g2 = self.group_of_cell[mirror.cell];
            if g1 == g2 {
                // Facet inside a cospherical group: zero-length dual
                degenerate += 1;
                continue;
            }

            let key = (g1.min(g2), g1.max(g2));
            let id = match edge_index.get(&key) {
                Some(&id) => id,
                None => {
                    let geometry = if self.triangulation.is_infinite(mirror.cell) {
                        EdgeGeometry::Ray {
                            source: g1,
                            direction: self.outward_normal(facet).normalize(),
                        }
                    } else {
                        EdgeGeometry::Segment {
                            source: key.0,
                            target: key.1,
                        }
                    };
                    let id = self.edges.len();
                    self.edges.push(VoronoiEdge {
                        geometry,
                        facets: Vec::new(),
                    });
                    edge_index.insert(key, id);
                    if let EdgeGeometry::Segment { source, target } = geometry {
                        self.edge_of_vertex_pair.insert((source, target), id);
                    }
                    id
                }
            };
            self.edges[id].facets.push(facet);
        }

        if degenerate > 0 {
            debug!("skipped {} facets interior to cospherical groups", degenerate);
        }
    }

    /// Normal of a facet pointing out of its (finite) naming cell
    pub fn outward_normal(&self, facet: Facet) -> DVec3 {
        let tri = &self.triangulation;
        let [a, b, c] = tri.facet_vertices(facet).map(|v| tri.position(v));
        let apex = tri.position(tri.cell_vertices(facet.cell)[facet.index]);
        let n = triangle_normal(a, b, c);
        if n.dot(apex - a) > 0.0 {
            -n
        } else {
            n
        }
    }

    /// Voronoi vertex of a finite Delaunay cell
    pub fn vertex_of_cell(&self, cell: usize) -> Option<usize> {
        let group = self.group_of_cell[cell];
        (group < self.vertices.len()).then_some(group)
    }

    /// Voronoi cell of a Delaunay vertex (multi mode, real vertices only)
    pub fn cell_of_vertex(&self, vertex: usize) -> Option<usize> {
        self.cell_of_vertex.get(vertex).copied().flatten()
    }

    /// Segment edge joining two Voronoi vertices, in either order
    pub fn edge_of_vertex_pair(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_of_vertex_pair.get(&(a.min(b), a.max(b))).copied()
    }

    /// Isosurface vertex of `cell` for the sheet crossing `edge`
    ///
    /// Uses the cycle the cell registered on the edge. Failing that, walks the
    /// ring of cells around the edge for an assigned cycle that is also valid
    /// in this cell. Returns `None` when the ring is exhausted.
    pub fn resolve_isovertex(&self, cell: usize, edge: usize) -> Option<usize> {
        let target = &self.cells[cell];
        let Some(start) = self.cell_edges.find(cell, edge) else {
            warn!("cell {} has no record for edge {}", cell, edge);
            return None;
        };

        let found = self
            .cell_edges
            .ring(start)
            .filter_map(|record| record.cycle)
            .find(|&cycle| cycle < target.num_iso);

        match found {
            Some(cycle) => Some(target.iso_start + cycle),
            None => {
                warn!(
                    "no isosurface vertex of cell {} reaches edge {}",
                    cell, edge
                );
                None
            }
        }
    }
}
