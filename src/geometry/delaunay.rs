//! 3D Delaunay triangulation
//!
//! The tetrahedralization itself comes from the `delaunay` crate. Its cells and
//! neighbour links are copied into an index arena keyed by input order, and the
//! unbounded region outside the convex hull is closed with "infinite" cells
//! that share a single virtual vertex. Every finite facet then has exactly two
//! incident cells and hull facets need no special casing during traversal.
//!
//! Cell conventions:
//! - finite cells `[v0, v1, v2, v3]` satisfy `orient3d(v0, v1, v2, v3) > 0`
//! - infinite cells are stored as `[INFINITE, a, b, c]`, with the hull face
//!   `(a, b, c)` oriented so the interior lies below it
//! - `neighbors[i]` is the cell across the facet opposite `vertices[i]`

use std::collections::{HashMap, HashSet, VecDeque};

use ::delaunay::core::delaunay_triangulation::DelaunayTriangulation;
use ::delaunay::core::triangulation_data_structure::{CellKey, VertexKey};
use ::delaunay::vertex;
use glam::DVec3;
use log::debug;

use super::{circumcenter, collinear, insphere, orient3d};
use crate::error::{Result, VoronoiError};

/// Index of the virtual vertex at infinity
pub const INFINITE: usize = usize::MAX;

/// A triangulation input point, tagged real or dummy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint {
    pub position: DVec3,
    /// Dummy points only bound the diagram and never reach the output
    pub is_dummy: bool,
}

impl LabeledPoint {
    pub fn real(position: DVec3) -> Self {
        Self {
            position,
            is_dummy: false,
        }
    }

    pub fn dummy(position: DVec3) -> Self {
        Self {
            position,
            is_dummy: true,
        }
    }
}

/// A triangular facet, named by a cell and the index of the opposite vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Facet {
    pub cell: usize,
    pub index: usize,
}

#[derive(Debug, Clone)]
struct Tetrahedron {
    vertices: [usize; 4],
    neighbors: [usize; 4],
}

/// Delaunay tetrahedralization of a labeled point set
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<LabeledPoint>,
    cells: Vec<Tetrahedron>,
    /// One incident cell per vertex
    vertex_cell: Vec<usize>,
}

impl Triangulation {
    /// Triangulate all points in one bulk call
    ///
    /// # Arguments
    ///
    /// * `points` - Sites in input order; vertex `i` of the result is `points[i]`
    ///
    /// # Errors
    ///
    /// Returns `Degenerate` if there are fewer than 4 points, if two points
    /// coincide, if all points are coplanar, or if the triangulation crate
    /// rejects the point set.
    pub fn build(points: &[LabeledPoint]) -> Result<Self> {
        if points.len() < 4 {
            return Err(VoronoiError::Degenerate(format!(
                "need at least 4 points to triangulate, got {}",
                points.len()
            )));
        }

        let mut seen = HashSet::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            if !p.position.is_finite() {
                return Err(VoronoiError::Degenerate(format!(
                    "point {} is not finite ({})",
                    i, p.position
                )));
            }
            if !seen.insert(coord_key(p.position)) {
                return Err(VoronoiError::Degenerate(format!(
                    "point {} duplicates an earlier point ({})",
                    i, p.position
                )));
            }
        }
        check_full_dimensional(points)?;

        let vertices: Vec<_> = points
            .iter()
            .map(|p| vertex!([p.position.x, p.position.y, p.position.z]))
            .collect();
        // Retries may perturb coordinates, but uuids survive
        let index_of: HashMap<_, usize> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.uuid(), i))
            .collect();
        let dt = DelaunayTriangulation::new(&vertices)
            .map_err(|e| VoronoiError::Degenerate(format!("triangulation failed: {}", e)))?;

        let mut vertex_index: HashMap<VertexKey, usize> = HashMap::with_capacity(points.len());
        for (key, vertex) in dt.vertices() {
            let index = index_of.get(&vertex.uuid()).ok_or_else(|| {
                VoronoiError::Degenerate(format!("vertex {:?} matches no input point", key))
            })?;
            vertex_index.insert(key, *index);
        }
        if vertex_index.len() != points.len() {
            return Err(VoronoiError::Degenerate(format!(
                "triangulation kept {} of {} points",
                vertex_index.len(),
                points.len()
            )));
        }

        let cell_index: HashMap<CellKey, usize> = dt
            .cells()
            .enumerate()
            .map(|(i, (key, _))| (key, i))
            .collect();

        let mut cells = Vec::with_capacity(cell_index.len() * 2);
        for (key, cell) in dt.cells() {
            let keys = cell.vertices();
            if keys.len() != 4 {
                return Err(VoronoiError::Degenerate(format!(
                    "cell {:?} has {} vertices",
                    key,
                    keys.len()
                )));
            }
            let mut vertices = [0; 4];
            for (slot, k) in vertices.iter_mut().zip(keys) {
                *slot = *vertex_index.get(k).ok_or_else(|| {
                    VoronoiError::Degenerate(format!("cell {:?} has an unknown vertex", key))
                })?;
            }

            // Neighbour i lies across the facet opposite vertex i; boundary facets have none
            let mut neighbors = [INFINITE; 4];
            if let Some(adjacent) = cell.neighbors() {
                for (slot, n) in neighbors.iter_mut().zip(adjacent.iter()) {
                    if let Some(&n) = n.as_ref().and_then(|n| cell_index.get(n)) {
                        *slot = n;
                    }
                }
            }
            cells.push(Tetrahedron {
                vertices,
                neighbors,
            });
        }

        let mut tri = Triangulation {
            points: points.to_vec(),
            cells,
            vertex_cell: Vec::new(),
        };
        tri.orient_finite_cells()?;
        tri.close_hull();
        tri.vertex_cell = vec![0; points.len()];
        for (id, cell) in tri.cells.iter().enumerate() {
            for &v in &cell.vertices {
                if v != INFINITE {
                    tri.vertex_cell[v] = id;
                }
            }
        }

        debug!(
            "triangulated {} points into {} finite cells ({} total)",
            tri.points.len(),
            dt.number_of_cells(),
            tri.cells.len()
        );
        Ok(tri)
    }

    /// Swap the first two vertices of negatively oriented cells
    fn orient_finite_cells(&mut self) -> Result<()> {
        for id in 0..self.cells.len() {
            let [a, b, c, d] = self.cells[id].vertices;
            let o = orient3d(
                self.position(a),
                self.position(b),
                self.position(c),
                self.position(d),
            );
            if o == 0.0 {
                return Err(VoronoiError::Degenerate(format!(
                    "cell {} is flat ({}, {}, {}, {})",
                    id, a, b, c, d
                )));
            }
            if o < 0.0 {
                let cell = &mut self.cells[id];
                cell.vertices.swap(0, 1);
                cell.neighbors.swap(0, 1);
            }
        }
        Ok(())
    }

    /// Cap every boundary facet with an infinite cell and link the caps
    fn close_hull(&mut self) {
        let finite = self.cells.len();
        let mut caps = Vec::new();
        for cell in 0..finite {
            for index in 0..4 {
                if self.cells[cell].neighbors[index] != INFINITE {
                    continue;
                }
                let [a, b, c] = self.facet_vertices(Facet { cell, index });
                let apex = self.position(self.cells[cell].vertices[index]);
                let below = orient3d(self.position(a), self.position(b), self.position(c), apex);
                let vertices = if below > 0.0 {
                    [INFINITE, a, b, c]
                } else {
                    [INFINITE, b, a, c]
                };
                let cap = self.cells.len();
                self.cells.push(Tetrahedron {
                    vertices,
                    neighbors: [cell, INFINITE, INFINITE, INFINITE],
                });
                self.cells[cell].neighbors[index] = cap;
                caps.push(cap);
            }
        }

        // Caps sharing a hull edge are neighbours across the facet through INFINITE
        let mut open: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        for cap in caps {
            let vertices = self.cells[cap].vertices;
            for i in 1..4 {
                let mut rest = (1..4).filter(|&j| j != i).map(|j| vertices[j]);
                let (x, y) = match (rest.next(), rest.next()) {
                    (Some(x), Some(y)) => (x.min(y), x.max(y)),
                    _ => continue,
                };
                if let Some((other, j)) = open.remove(&(x, y)) {
                    self.cells[cap].neighbors[i] = other;
                    self.cells[other].neighbors[j] = cap;
                } else {
                    open.insert((x, y), (cap, i));
                }
            }
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn point(&self, v: usize) -> &LabeledPoint {
        &self.points[v]
    }

    pub fn points(&self) -> &[LabeledPoint] {
        &self.points
    }

    pub fn position(&self, v: usize) -> DVec3 {
        self.points[v].position
    }

    pub fn is_dummy(&self, v: usize) -> bool {
        v == INFINITE || self.points[v].is_dummy
    }

    /// Vertex indices of a cell (`INFINITE` first for infinite cells)
    pub fn cell_vertices(&self, cell: usize) -> [usize; 4] {
        self.cells[cell].vertices
    }

    pub fn neighbor(&self, cell: usize, index: usize) -> usize {
        self.cells[cell].neighbors[index]
    }

    pub fn is_infinite(&self, cell: usize) -> bool {
        self.cells[cell].vertices[0] == INFINITE
    }

    /// Indices of all finite cells, ascending
    pub fn finite_cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.cells.len()).filter(move |&c| !self.is_infinite(c))
    }

    /// Every facet with at least one finite incident cell, reported once
    ///
    /// The reporting cell is always finite: hull facets are named from their
    /// finite side, interior facets from the lower-indexed cell.
    pub fn finite_facets(&self) -> Vec<Facet> {
        let mut facets = Vec::new();
        for cell in self.finite_cells() {
            for index in 0..4 {
                let other = self.cells[cell].neighbors[index];
                if self.is_infinite(other) || cell < other {
                    facets.push(Facet { cell, index });
                }
            }
        }
        facets
    }

    /// The same facet named from the other incident cell
    pub fn mirror(&self, facet: Facet) -> Facet {
        let other = self.cells[facet.cell].neighbors[facet.index];
        let index = self.cells[other]
            .neighbors
            .iter()
            .position(|&n| n == facet.cell)
            .unwrap_or(0);
        Facet { cell: other, index }
    }

    /// The three facet vertices in order `(i+1)%4, (i+2)%4, (i+3)%4`
    pub fn facet_vertices(&self, facet: Facet) -> [usize; 3] {
        let v = self.cells[facet.cell].vertices;
        let i = facet.index;
        [v[(i + 1) % 4], v[(i + 2) % 4], v[(i + 3) % 4]]
    }

    /// Circumcenter of a finite cell
    pub fn circumcenter(&self, cell: usize) -> DVec3 {
        let [a, b, c, d] = self.cells[cell].vertices;
        circumcenter(
            self.position(a),
            self.position(b),
            self.position(c),
            self.position(d),
        )
    }

    /// Whether the vertex across a facet lies exactly on the owner's circumsphere
    ///
    /// Only meaningful for facets between two finite cells; both cells then
    /// share one circumsphere.
    pub fn is_cospherical(&self, facet: Facet) -> bool {
        let mirror = self.mirror(facet);
        if self.is_infinite(facet.cell) || self.is_infinite(mirror.cell) {
            return false;
        }
        let [a, b, c, d] = self.cells[facet.cell].vertices;
        let apex = self.cells[mirror.cell].vertices[mirror.index];
        insphere(
            self.position(a),
            self.position(b),
            self.position(c),
            self.position(d),
            self.position(apex),
        ) == 0.0
    }

    /// Whether two adjacent infinite cells have coplanar hull faces
    pub fn hull_faces_coplanar(&self, first: usize, second: usize) -> bool {
        let [_, a, b, c] = self.cells[first].vertices;
        self.cells[second].vertices[1..]
            .iter()
            .filter(|&&w| w != a && w != b && w != c)
            .all(|&w| {
                orient3d(
                    self.position(a),
                    self.position(b),
                    self.position(c),
                    self.position(w),
                ) == 0.0
            })
    }

    /// All cells (finite and infinite) having `v` as a vertex
    pub fn incident_cells(&self, v: usize) -> Vec<usize> {
        let start = self.vertex_cell[v];
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        visited.insert(start);
        queue.push_back(start);
        while let Some(cell) = queue.pop_front() {
            result.push(cell);
            let tet = &self.cells[cell];
            for i in 0..4 {
                // Facets containing v are the ones not opposite it
                if tet.vertices[i] == v {
                    continue;
                }
                let next = tet.neighbors[i];
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Vertices sharing a Delaunay edge with `v` (may include `INFINITE`)
    pub fn adjacent_vertices(&self, v: usize) -> Vec<usize> {
        let mut adjacent: Vec<usize> = self
            .incident_cells(v)
            .into_iter()
            .flat_map(|c| self.cells[c].vertices)
            .filter(|&w| w != v)
            .collect();
        adjacent.sort_unstable();
        adjacent.dedup();
        adjacent
    }

    /// Cells around the Delaunay edge `(a, b)` in rotational order
    ///
    /// `cell` must contain both vertices. When it is finite the rotation runs
    /// so that consecutive cells `(a, b, c, d)` keep `orient3d > 0`.
    pub fn edge_star(&self, cell: usize, a: usize, b: usize) -> Result<Vec<usize>> {
        let vertices = self.cells[cell].vertices;
        let mut others = vertices.iter().copied().filter(|&w| w != a && w != b);
        let (mut c, mut d) = match (others.next(), others.next()) {
            (Some(c), Some(d)) => (c, d),
            _ => {
                return Err(VoronoiError::Degenerate(format!(
                    "cell {} does not contain edge ({}, {})",
                    cell, a, b
                )))
            }
        };

        if !self.is_infinite(cell)
            && orient3d(
                self.position(a),
                self.position(b),
                self.position(c),
                self.position(d),
            ) < 0.0
        {
            std::mem::swap(&mut c, &mut d);
        }

        let mut star = Vec::new();
        let mut current = cell;
        loop {
            star.push(current);
            let tet = &self.cells[current];
            let exit = tet.vertices.iter().position(|&w| w == c).unwrap_or(0);
            let next = tet.neighbors[exit];

            let entry = self.cells[next]
                .vertices
                .iter()
                .copied()
                .find(|&w| w != a && w != b && w != d);
            match entry {
                Some(e) => {
                    c = d;
                    d = e;
                }
                None => {
                    return Err(VoronoiError::Degenerate(format!(
                        "broken adjacency around edge ({}, {})",
                        a, b
                    )))
                }
            }

            current = next;
            if current == cell {
                break;
            }
            if star.len() > self.cells.len() {
                return Err(VoronoiError::Degenerate(format!(
                    "edge star of ({}, {}) does not close",
                    a, b
                )));
            }
        }
        Ok(star)
    }
}

/// Exact bit pattern of a position; +0.0 folds negative zero onto zero
fn coord_key(p: DVec3) -> [u64; 3] {
    [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()]
}

/// Reject point sets that span no volume
fn check_full_dimensional(points: &[LabeledPoint]) -> Result<()> {
    let p = |i: usize| points[i].position;

    let third = (2..points.len()).find(|&i| !collinear(p(0), p(1), p(i)));
    let third = match third {
        Some(i) => i,
        None => {
            return Err(VoronoiError::Degenerate(format!(
                "all {} points are collinear",
                points.len()
            )))
        }
    };
    if (1..points.len()).all(|i| orient3d(p(0), p(1), p(third), p(i)) == 0.0) {
        return Err(VoronoiError::Degenerate(format!(
            "all {} points are coplanar",
            points.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_points(n: usize, seed: u64) -> Vec<LabeledPoint> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                LabeledPoint::real(DVec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ))
            })
            .collect()
    }

    fn lattice_points(n: i32) -> Vec<LabeledPoint> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    points.push(LabeledPoint::real(DVec3::new(
                        i as f64 + 0.5,
                        j as f64 + 0.5,
                        k as f64 + 0.5,
                    )));
                }
            }
        }
        points
    }

    fn assert_valid(tri: &Triangulation) {
        for c in 0..tri.num_cells() {
            let v = tri.cell_vertices(c);
            if tri.is_infinite(c) {
                assert!(!v[1..].contains(&INFINITE));
            } else {
                let o = orient3d(
                    tri.position(v[0]),
                    tri.position(v[1]),
                    tri.position(v[2]),
                    tri.position(v[3]),
                );
                assert!(o > 0.0, "cell {} is not positively oriented", c);
            }
            for i in 0..4 {
                let n = tri.neighbor(c, i);
                assert!(n < tri.num_cells());
                let mirror = tri.mirror(Facet { cell: c, index: i });
                assert_eq!(tri.neighbor(mirror.cell, mirror.index), c);

                let mut mine = tri.facet_vertices(Facet { cell: c, index: i });
                let mut theirs = tri.facet_vertices(mirror);
                mine.sort_unstable();
                theirs.sort_unstable();
                assert_eq!(mine, theirs);
            }
        }
    }

    fn assert_empty_spheres(tri: &Triangulation) {
        for c in tri.finite_cells() {
            let [a, b, cc, d] = tri.cell_vertices(c);
            for v in 0..tri.num_vertices() {
                if [a, b, cc, d].contains(&v) {
                    continue;
                }
                let s = insphere(
                    tri.position(a),
                    tri.position(b),
                    tri.position(cc),
                    tri.position(d),
                    tri.position(v),
                );
                assert!(s <= 0.0, "vertex {} inside circumsphere of cell {}", v, c);
            }
        }
    }

    #[test]
    fn test_single_tetrahedron() {
        let points = vec![
            LabeledPoint::real(DVec3::ZERO),
            LabeledPoint::real(DVec3::X),
            LabeledPoint::real(DVec3::Y),
            LabeledPoint::real(DVec3::Z),
        ];
        let tri = Triangulation::build(&points).unwrap();
        assert_eq!(tri.finite_cells().count(), 1);
        assert_eq!(tri.num_cells(), 5);
        assert_eq!(tri.finite_facets().len(), 4);
        assert_valid(&tri);
    }

    #[test]
    fn test_random_points_are_delaunay() {
        let points = random_points(200, 7);
        let tri = Triangulation::build(&points).unwrap();
        assert_valid(&tri);
        assert_empty_spheres(&tri);
    }

    #[test]
    fn test_lattice_points_are_delaunay() {
        let tri = Triangulation::build(&lattice_points(3)).unwrap();
        assert_valid(&tri);
        assert_empty_spheres(&tri);

        // A convex point set is tiled exactly: total volume equals the hull's
        let volume: f64 = tri
            .finite_cells()
            .map(|c| {
                let v = tri.cell_vertices(c).map(|i| tri.position(i));
                orient3d(v[0], v[1], v[2], v[3]) / 6.0
            })
            .sum();
        assert!((volume - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let few = vec![LabeledPoint::real(DVec3::ZERO); 3];
        assert!(matches!(
            Triangulation::build(&few),
            Err(VoronoiError::Degenerate(_))
        ));

        let mut duplicate = random_points(5, 1);
        duplicate.push(duplicate[2]);
        assert!(matches!(
            Triangulation::build(&duplicate),
            Err(VoronoiError::Degenerate(_))
        ));

        let planar: Vec<LabeledPoint> = (0..6)
            .map(|i| LabeledPoint::real(DVec3::new(i as f64, (i * i) as f64, 0.0)))
            .collect();
        assert!(matches!(
            Triangulation::build(&planar),
            Err(VoronoiError::Degenerate(_))
        ));
    }

    #[test]
    fn test_finite_facets_are_unique_and_finite_owned() {
        let tri = Triangulation::build(&random_points(60, 3)).unwrap();
        let facets = tri.finite_facets();
        let mut keys = HashSet::new();
        for f in &facets {
            assert!(!tri.is_infinite(f.cell));
            let mut key = tri.facet_vertices(*f);
            key.sort_unstable();
            assert!(keys.insert(key));
        }
    }

    #[test]
    fn test_incident_cells_contain_vertex() {
        let tri = Triangulation::build(&lattice_points(3)).unwrap();
        // Center point of the 3x3x3 block is interior: no infinite cells around it
        let center = 13;
        let cells = tri.incident_cells(center);
        assert!(!cells.is_empty());
        for &c in &cells {
            assert!(tri.cell_vertices(c).contains(&center));
            assert!(!tri.is_infinite(c));
        }
        assert!(!tri.adjacent_vertices(center).contains(&INFINITE));
    }

    #[test]
    fn test_edge_star_closes() {
        let tri = Triangulation::build(&random_points(80, 11)).unwrap();
        let cell = tri.finite_cells().next().unwrap();
        let [a, b, _, _] = tri.cell_vertices(cell);
        let star = tri.edge_star(cell, a, b).unwrap();
        assert!(star.len() >= 3);
        assert_eq!(star[0], cell);
        for &c in &star {
            let v = tri.cell_vertices(c);
            assert!(v.contains(&a) && v.contains(&b));
        }
        // Consecutive cells share a facet
        for w in 0..star.len() {
            let (c0, c1) = (star[w], star[(w + 1) % star.len()]);
            assert!((0..4).any(|i| tri.neighbor(c0, i) == c1));
        }
    }

    #[test]
    fn test_vertices_keep_input_order_and_labels() {
        let mut points = random_points(30, 5);
        for p in points.iter_mut().step_by(3) {
            p.is_dummy = true;
        }
        let tri = Triangulation::build(&points).unwrap();
        assert_eq!(tri.num_vertices(), points.len());
        for (i, p) in points.iter().enumerate() {
            assert_eq!(tri.position(i), p.position);
            assert_eq!(tri.is_dummy(i), p.is_dummy);
        }
        assert!(tri.is_dummy(INFINITE));

        // Every vertex sits in some cell and its incident cells contain it
        for v in 0..tri.num_vertices() {
            let cells = tri.incident_cells(v);
            assert!(!cells.is_empty());
            assert!(cells.iter().all(|&c| tri.cell_vertices(c).contains(&v)));
        }
    }

    #[test]
    fn test_hull_caps_close_the_triangulation() {
        let tri = Triangulation::build(&random_points(40, 9)).unwrap();
        assert_valid(&tri);
        let hull: Vec<Facet> = tri
            .finite_facets()
            .into_iter()
            .filter(|&f| tri.is_infinite(tri.mirror(f).cell))
            .collect();
        let caps = (0..tri.num_cells()).filter(|&c| tri.is_infinite(c)).count();
        assert_eq!(hull.len(), caps);
        // Euler on a closed triangulated sphere: F = 2V - 4
        let on_hull: HashSet<usize> = hull.iter().flat_map(|&f| tri.facet_vertices(f)).collect();
        assert_eq!(caps, 2 * on_hull.len() - 4);
    }
}
