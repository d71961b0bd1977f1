//! Cell-edge adjacency
//!
//! Every (cell, edge) pair where a real Voronoi cell borders a Voronoi edge
//! gets one [`CellEdge`]. The records of one edge form a circular list through
//! `next`, so a cycle assigned by one cell can be found from any other cell
//! around the same edge.

use std::collections::HashMap;

use super::edges::VoronoiEdge;
use crate::geometry::delaunay::Triangulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellEdge {
    pub cell: usize,
    pub edge: usize,
    /// Cycle of `cell` whose sheet crosses `edge`, once placement has run
    pub cycle: Option<usize>,
    /// Next record around the same edge
    pub next: usize,
}

/// Arena of cell-edge records plus the `(cell, edge)` lookup
#[derive(Debug, Clone, Default)]
pub struct CellEdgeGraph {
    pub records: Vec<CellEdge>,
    index: HashMap<(usize, usize), usize>,
}

impl CellEdgeGraph {
    /// Link every edge to the real cells around it
    ///
    /// The cells on an edge are the non-dummy corners of all its facets;
    /// `cell_of_vertex` maps a Delaunay vertex to its Voronoi cell.
    pub fn build(
        edges: &[VoronoiEdge],
        triangulation: &Triangulation,
        cell_of_vertex: &[Option<usize>],
    ) -> Self {
        let mut graph = CellEdgeGraph::default();

        for (edge_id, edge) in edges.iter().enumerate() {
            let mut cells: Vec<usize> = Vec::new();
            for &facet in &edge.facets {
                for v in triangulation.facet_vertices(facet) {
                    if triangulation.is_dummy(v) {
                        continue;
                    }
                    if let Some(cell) = cell_of_vertex[v] {
                        if !cells.contains(&cell) {
                            cells.push(cell);
                        }
                    }
                }
            }

            let first = graph.records.len();
            let count = cells.len();
            for (n, &cell) in cells.iter().enumerate() {
                let id = first + n;
                graph.records.push(CellEdge {
                    cell,
                    edge: edge_id,
                    cycle: None,
                    next: first + (n + 1) % count,
                });
                graph.index.insert((cell, edge_id), id);
            }
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record index for `(cell, edge)`
    pub fn find(&self, cell: usize, edge: usize) -> Option<usize> {
        self.index.get(&(cell, edge)).copied()
    }

    pub fn get(&self, id: usize) -> &CellEdge {
        &self.records[id]
    }

    /// Assign `cycle` to the record of `(cell, edge)`; false if there is none
    pub fn set_cycle(&mut self, cell: usize, edge: usize, cycle: usize) -> bool {
        match self.find(cell, edge) {
            Some(id) => {
                self.records[id].cycle = Some(cycle);
                true
            }
            None => false,
        }
    }

    /// Records around the edge of `start`, beginning with `start` itself
    pub fn ring(&self, start: usize) -> RingIter<'_> {
        RingIter {
            graph: self,
            start,
            current: Some(start),
        }
    }
}

/// Iterator following `next` once around an edge
pub struct RingIter<'a> {
    graph: &'a CellEdgeGraph,
    start: usize,
    current: Option<usize>,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = &'a CellEdge;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let record = &self.graph.records[id];
        self.current = (record.next != self.start).then_some(record.next);
        Some(record)
    }
}
