//! Isosurface vertex placement
//!
//! Single mode places one vertex per active cube, at the centroid of the
//! cube-edge crossings. Multi mode places one vertex per surface sheet
//! through each Voronoi cell: crossings on the cell's facet edges are linked
//! into cycles, and each cycle contributes its centroid.

use std::collections::HashMap;

use glam::DVec3;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::grid::{Cube, ScalarGrid, CUBE_EDGES};
use crate::voronoi::edges::{crosses_inclusive, is_bipolar};
use crate::voronoi::{VoronoiDiagram, VoronoiFacet, VoronoiVertex};

/// One surface sheet passing through a Voronoi cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// Facet-edge crossings linked into this sheet
    pub midpoints: Vec<DVec3>,
    /// Global Voronoi edges crossed by this sheet
    pub edges: Vec<usize>,
    /// Centroid of `midpoints`
    pub isovertex: DVec3,
}

/// Crossing point on a facet edge, a node of the per-cell cycle graph
#[derive(Debug, Clone)]
struct Midpoint {
    position: DVec3,
    edge: Option<usize>,
    neighbours: Vec<usize>,
}

/// Linear interpolation of the isovalue crossing between two samples
///
/// Falls back to `p1` when the samples are too close to separate.
pub fn interpolate(p1: DVec3, p2: DVec3, v1: f32, v2: f32, isovalue: f32) -> DVec3 {
    if (v1 - v2).abs() < 1e-6 {
        return p1;
    }
    let t = (isovalue as f64 - v1 as f64) / (v2 as f64 - v1 as f64);
    p1 + (p2 - p1) * t
}

fn centroid(points: &[DVec3]) -> DVec3 {
    points.iter().copied().sum::<DVec3>() / points.len() as f64
}

/// Isosurface vertex of one cube, or `None` if no cube edge crosses
pub fn cube_isovertex(grid: &ScalarGrid, cube: &Cube, isovalue: f32) -> Option<DVec3> {
    let [i, j, k] = cube.index;
    let values = grid.corner_values(i, j, k);
    let positions = grid.corner_positions(i, j, k);

    let crossings: Vec<DVec3> = CUBE_EDGES
        .iter()
        .filter(|[a, b]| crosses_inclusive(values[*a], values[*b], isovalue))
        .map(|&[a, b]| interpolate(positions[a], positions[b], values[a], values[b], isovalue))
        .collect();

    (!crossings.is_empty()).then(|| centroid(&crossings))
}

/// One slot per cube, filled in parallel
pub fn place_single(grid: &ScalarGrid, cubes: &[Cube], isovalue: f32) -> Vec<Option<DVec3>> {
    let placed: Vec<Option<DVec3>> = cubes
        .par_iter()
        .map(|cube| cube_isovertex(grid, cube, isovalue))
        .collect();

    info!(
        "placed {} isosurface vertices in {} cubes",
        placed.iter().filter(|p| p.is_some()).count(),
        cubes.len()
    );
    placed
}

/// Extract the surface sheets through one cell
///
/// Crossings are shared between the facets of an edge through the unordered
/// vertex pair. Within a facet, crossings are linked pairwise in cyclic order
/// (first with second, third with fourth, ...). Connected components of the
/// resulting graph are the cycles, in order of their first crossing.
pub fn cell_cycles<F>(
    facets: &[VoronoiFacet],
    vertices: &[VoronoiVertex],
    edge_of: F,
    isovalue: f32,
) -> Vec<Cycle>
where
    F: Fn(usize, usize) -> Option<usize>,
{
    let mut midpoints: Vec<Midpoint> = Vec::new();
    let mut midpoint_of_pair: HashMap<(usize, usize), usize> = HashMap::new();

    for facet in facets {
        let n = facet.vertices.len();
        let mut on_facet = Vec::new();

        for j in 0..n {
            let (a, b) = (facet.vertices[j], facet.vertices[(j + 1) % n]);
            let (va, vb) = (facet.values[j], facet.values[(j + 1) % n]);
            if !is_bipolar(va, vb, isovalue) {
                continue;
            }

            let key = (a.min(b), a.max(b));
            let id = *midpoint_of_pair.entry(key).or_insert_with(|| {
                midpoints.push(Midpoint {
                    position: interpolate(
                        vertices[a].position,
                        vertices[b].position,
                        va,
                        vb,
                        isovalue,
                    ),
                    edge: edge_of(a, b),
                    neighbours: Vec::new(),
                });
                midpoints.len() - 1
            });
            on_facet.push(id);
        }

        if on_facet.len() % 2 == 1 {
            // The last crossing stays unpaired on this facet
            warn!(
                "facet {:?} has an odd number ({}) of crossings at isovalue {}",
                facet.vertices,
                on_facet.len(),
                isovalue
            );
        }
        for pair in on_facet.chunks_exact(2) {
            midpoints[pair[0]].neighbours.push(pair[1]);
            midpoints[pair[1]].neighbours.push(pair[0]);
        }
    }

    let mut visited = vec![false; midpoints.len()];
    let mut cycles = Vec::new();

    for seed in 0..midpoints.len() {
        if visited[seed] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;
            component.push(current);
            for &next in &midpoints[current].neighbours {
                if !visited[next] {
                    stack.push(next);
                }
            }
        }

        let positions: Vec<DVec3> = component.iter().map(|&m| midpoints[m].position).collect();
        let mut edges: Vec<usize> = component.iter().filter_map(|&m| midpoints[m].edge).collect();
        edges.sort_unstable();
        edges.dedup();

        cycles.push(Cycle {
            isovertex: centroid(&positions),
            midpoints: positions,
            edges,
        });
    }

    cycles
}

/// Place the isosurface vertices of every cell
///
/// Cycles are extracted per cell in parallel. A second, ordered pass assigns
/// each cell its vertex range and registers every cycle on the cell-edge
/// records of the edges it crosses.
pub fn place_multi(diagram: &mut VoronoiDiagram, isovalue: f32) -> Vec<DVec3> {
    let per_cell: Vec<Vec<Cycle>> = {
        let diagram = &*diagram;
        diagram
            .cells
            .par_iter()
            .map(|cell| {
                cell_cycles(
                    &cell.facets,
                    &diagram.vertices,
                    |a, b| diagram.edge_of_vertex_pair(a, b),
                    isovalue,
                )
            })
            .collect()
    };

    let mut isovertices = Vec::new();
    let mut unregistered = 0;

    for (id, cycles) in per_cell.into_iter().enumerate() {
        let cell = &mut diagram.cells[id];
        cell.iso_start = isovertices.len();
        cell.num_iso = cycles.len();

        for (index, cycle) in cycles.iter().enumerate() {
            isovertices.push(cycle.isovertex);
            for &edge in &cycle.edges {
                if !diagram.cell_edges.set_cycle(id, edge, index) {
                    unregistered += 1;
                }
            }
        }
        cell.cycles = cycles;
    }

    if unregistered > 0 {
        debug!("{} cycle crossings had no cell-edge record", unregistered);
    }
    info!(
        "placed {} isosurface vertices in {} cells",
        isovertices.len(),
        diagram.cells.len()
    );
    isovertices
}
