//! Regularly sampled scalar fields
//!
//! A [`ScalarGrid`] stores samples on a uniform lattice (x varies fastest)
//! together with the real-space spacing and origin of the lattice. It
//! provides trilinear lookup, active-cube enumeration, supersampling, and
//! the non-adjacent cube selection used to thin the triangulation.

pub mod nrrd;

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use log::debug;
use rayon::prelude::*;

use crate::error::{Result, VoronoiError};

/// Lattice offsets of the 8 cube corners, bottom face (z = 0) first
pub const CUBE_CORNERS: [[i32; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Corner pairs forming the 12 cube edges (x edges, y edges, z edges)
pub const CUBE_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [2, 3],
    [4, 5],
    [6, 7],
    [0, 2],
    [1, 3],
    [4, 6],
    [5, 7],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// One lattice cell of the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cube {
    /// Lattice coordinates of the cube's minimum corner
    pub index: [i32; 3],
    /// Real-space position of the minimum corner (the representative lattice point)
    pub rep: DVec3,
    /// Real-space center of the cube
    pub center: DVec3,
}

/// Uniformly sampled 3D scalar field
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Distance between adjacent samples along each axis
    pub spacing: DVec3,
    /// Real-space position of sample (0, 0, 0)
    pub origin: DVec3,
    data: Vec<f32>,
}

impl ScalarGrid {
    /// Create a zero-filled grid
    pub fn new(dims: [usize; 3], spacing: DVec3, origin: DVec3) -> Self {
        let [nx, ny, nz] = dims;
        Self {
            nx,
            ny,
            nz,
            spacing,
            origin,
            data: vec![0.0; nx * ny * nz],
        }
    }

    /// Create a grid by evaluating `f` at every lattice point's real-space position
    pub fn from_fn<F>(dims: [usize; 3], spacing: DVec3, origin: DVec3, f: F) -> Self
    where
        F: Fn(DVec3) -> f32,
    {
        let mut grid = Self::new(dims, spacing, origin);
        for k in 0..grid.nz {
            for j in 0..grid.ny {
                for i in 0..grid.nx {
                    let p = grid.lattice_point(i as i32, j as i32, k as i32);
                    let idx = grid.linear_index(i, j, k);
                    grid.data[idx] = f(p);
                }
            }
        }
        grid
    }

    /// Wrap an existing sample buffer (x fastest, then y, then z)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the buffer length does not match the dimensions
    /// or if any spacing component is not strictly positive
    pub fn from_data(
        dims: [usize; 3],
        spacing: DVec3,
        origin: DVec3,
        data: Vec<f32>,
    ) -> Result<Self> {
        let [nx, ny, nz] = dims;
        if data.len() != nx * ny * nz {
            return Err(VoronoiError::InvalidConfig(format!(
                "grid of {}x{}x{} needs {} samples, got {}",
                nx,
                ny,
                nz,
                nx * ny * nz,
                data.len()
            )));
        }
        if !(spacing.x > 0.0 && spacing.y > 0.0 && spacing.z > 0.0) {
            return Err(VoronoiError::InvalidConfig(format!(
                "grid spacing must be positive (got {})",
                spacing
            )));
        }
        Ok(Self {
            nx,
            ny,
            nz,
            spacing,
            origin,
            data,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Raw samples, x fastest
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn linear_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.nx * (j + self.ny * k)
    }

    fn in_range(&self, i: i32, j: i32, k: i32) -> bool {
        i >= 0
            && j >= 0
            && k >= 0
            && (i as usize) < self.nx
            && (j as usize) < self.ny
            && (k as usize) < self.nz
    }

    /// Sample value at a lattice point; `0.0` outside the grid
    pub fn value(&self, i: i32, j: i32, k: i32) -> f32 {
        if self.in_range(i, j, k) {
            self.data[self.linear_index(i as usize, j as usize, k as usize)]
        } else {
            0.0
        }
    }

    /// Overwrite a sample; indices outside the grid are ignored
    pub fn set_value(&mut self, i: i32, j: i32, k: i32, value: f32) {
        if self.in_range(i, j, k) {
            let idx = self.linear_index(i as usize, j as usize, k as usize);
            self.data[idx] = value;
        }
    }

    /// Real-space position of a lattice point
    pub fn lattice_point(&self, i: i32, j: i32, k: i32) -> DVec3 {
        self.origin + DVec3::new(i as f64, j as f64, k as f64) * self.spacing
    }

    /// Real-space bounding box of the sample lattice
    pub fn bounds(&self) -> (DVec3, DVec3) {
        let extent = DVec3::new(
            self.nx.saturating_sub(1) as f64,
            self.ny.saturating_sub(1) as f64,
            self.nz.saturating_sub(1) as f64,
        ) * self.spacing;
        (self.origin, self.origin + extent)
    }

    /// Clamp a point into the sampled domain
    pub fn clamp(&self, point: DVec3) -> DVec3 {
        let (min, max) = self.bounds();
        point.clamp(min, max)
    }

    /// Trilinear interpolation at a real-space point
    ///
    /// Points outside the domain are clamped to the nearest in-domain location.
    pub fn trilinear(&self, point: DVec3) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }

        let g = (self.clamp(point) - self.origin) / self.spacing;
        let (i0, tx) = Self::cell_coordinate(g.x, self.nx);
        let (j0, ty) = Self::cell_coordinate(g.y, self.ny);
        let (k0, tz) = Self::cell_coordinate(g.z, self.nz);

        let v = |di: i32, dj: i32, dk: i32| self.value(i0 + di, j0 + dj, k0 + dk) as f64;

        let c00 = v(0, 0, 0) * (1.0 - tx) + v(1, 0, 0) * tx;
        let c10 = v(0, 1, 0) * (1.0 - tx) + v(1, 1, 0) * tx;
        let c01 = v(0, 0, 1) * (1.0 - tx) + v(1, 0, 1) * tx;
        let c11 = v(0, 1, 1) * (1.0 - tx) + v(1, 1, 1) * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;

        (c0 * (1.0 - tz) + c1 * tz) as f32
    }

    /// Split a continuous grid coordinate into a cell index and a local fraction
    fn cell_coordinate(g: f64, n: usize) -> (i32, f64) {
        if n < 2 {
            return (0, 0.0);
        }
        let max_cell = (n - 2) as f64;
        let cell = g.floor().clamp(0.0, max_cell);
        (cell as i32, (g - cell).clamp(0.0, 1.0))
    }

    /// Sample values at the 8 corners of the cube with minimum corner `(i, j, k)`
    pub fn corner_values(&self, i: i32, j: i32, k: i32) -> [f32; 8] {
        let mut values = [0.0; 8];
        for (value, offset) in values.iter_mut().zip(CUBE_CORNERS.iter()) {
            *value = self.value(i + offset[0], j + offset[1], k + offset[2]);
        }
        values
    }

    /// Real-space positions of the 8 corners of a cube
    pub fn corner_positions(&self, i: i32, j: i32, k: i32) -> [DVec3; 8] {
        let mut positions = [DVec3::ZERO; 8];
        for (position, offset) in positions.iter_mut().zip(CUBE_CORNERS.iter()) {
            *position = self.lattice_point(i + offset[0], j + offset[1], k + offset[2]);
        }
        positions
    }

    /// Whether the cube has corners on both sides of the isovalue
    ///
    /// Corners are classified by `value < isovalue`; the cube is active when any
    /// corner's class differs from corner 0. Cubes not fully inside the grid are
    /// never active.
    pub fn is_cube_active(&self, i: i32, j: i32, k: i32, isovalue: f32) -> bool {
        if !self.in_range(i, j, k) || !self.in_range(i + 1, j + 1, k + 1) {
            return false;
        }
        let values = self.corner_values(i, j, k);
        let below = values[0] < isovalue;
        values[1..].iter().any(|&v| (v < isovalue) != below)
    }

    /// Build the [`Cube`] record for lattice coordinates `(i, j, k)`
    pub fn cube(&self, i: i32, j: i32, k: i32) -> Cube {
        let rep = self.lattice_point(i, j, k);
        Cube {
            index: [i, j, k],
            rep,
            center: rep + self.spacing * 0.5,
        }
    }

    /// All active cubes in lattice order (i outermost, k innermost)
    pub fn active_cubes(&self, isovalue: f32) -> Vec<Cube> {
        let mut cubes = Vec::new();
        for i in 0..self.nx.saturating_sub(1) as i32 {
            for j in 0..self.ny.saturating_sub(1) as i32 {
                for k in 0..self.nz.saturating_sub(1) as i32 {
                    if self.is_cube_active(i, j, k, isovalue) {
                        cubes.push(self.cube(i, j, k));
                    }
                }
            }
        }
        debug!("found {} active cubes at isovalue {}", cubes.len(), isovalue);
        cubes
    }

    /// Resample the field `factor` times more densely along every axis
    ///
    /// # Arguments
    ///
    /// * `factor` - Refinement per axis; 0 and 1 return an unchanged copy
    ///
    /// # Returns
    ///
    /// A grid over the same bounds with `n' = n * factor - (factor - 1)` samples
    /// per axis and spacing divided by `factor`, every sample a trilinear
    /// interpolation of the original field.
    ///
    /// # Performance
    ///
    /// Samples are filled in parallel with rayon. Memory grows with the cube of
    /// `factor`.
    pub fn supersample(&self, factor: u32) -> ScalarGrid {
        if factor <= 1 {
            return self.clone();
        }
        let f = factor as usize;
        let scale = |n: usize| if n == 0 { 0 } else { n * f - (f - 1) };
        let (nx, ny, nz) = (scale(self.nx), scale(self.ny), scale(self.nz));
        let spacing = self.spacing / factor as f64;

        let data: Vec<f32> = (0..nx * ny * nz)
            .into_par_iter()
            .map(|idx| {
                let i = idx % nx;
                let j = (idx / nx) % ny;
                let k = idx / (nx * ny);
                let p = self.origin + DVec3::new(i as f64, j as f64, k as f64) * spacing;
                self.trilinear(p)
            })
            .collect();

        debug!(
            "supersampled {}x{}x{} -> {}x{}x{} (factor {})",
            self.nx, self.ny, self.nz, nx, ny, nz, factor
        );

        ScalarGrid {
            nx,
            ny,
            nz,
            spacing,
            origin: self.origin,
            data,
        }
    }
}

/// Greedily select a maximal set of pairwise non-adjacent cubes
///
/// Cubes are visited in input order; a cube is kept unless one of its 26
/// lattice neighbours has already been kept.
pub fn separate_active_cubes(cubes: &[Cube]) -> Vec<Cube> {
    let mut chosen: HashSet<[i32; 3]> = HashSet::new();
    let mut selected = Vec::new();

    for cube in cubes {
        let [i, j, k] = cube.index;
        let mut blocked = false;
        'search: for di in -1..=1 {
            for dj in -1..=1 {
                for dk in -1..=1 {
                    if (di, dj, dk) != (0, 0, 0) && chosen.contains(&[i + di, j + dj, k + dk]) {
                        blocked = true;
                        break 'search;
                    }
                }
            }
        }
        if !blocked {
            chosen.insert(cube.index);
            selected.push(*cube);
        }
    }

    debug!(
        "kept {} of {} active cubes after separation",
        selected.len(),
        cubes.len()
    );
    selected
}

/// Keep the largest colour class of a greedy colouring of the adjacency graph
///
/// Cubes are coloured in input order with the smallest colour no coloured
/// neighbour uses. Ties between equally large classes go to the lower colour.
pub fn separate_active_cubes_by_coloring(cubes: &[Cube]) -> Vec<Cube> {
    let position: HashMap<[i32; 3], usize> = cubes
        .iter()
        .enumerate()
        .map(|(n, cube)| (cube.index, n))
        .collect();
    let mut color: Vec<Option<usize>> = vec![None; cubes.len()];
    let mut class_size: Vec<usize> = Vec::new();

    for (n, cube) in cubes.iter().enumerate() {
        let [i, j, k] = cube.index;
        let mut taken = HashSet::new();
        for di in -1..=1 {
            for dj in -1..=1 {
                for dk in -1..=1 {
                    if (di, dj, dk) == (0, 0, 0) {
                        continue;
                    }
                    if let Some(&m) = position.get(&[i + di, j + dj, k + dk]) {
                        if let Some(c) = color[m] {
                            taken.insert(c);
                        }
                    }
                }
            }
        }
        let c = (0..).find(|c| !taken.contains(c)).unwrap_or(0);
        color[n] = Some(c);
        if c == class_size.len() {
            class_size.push(0);
        }
        class_size[c] += 1;
    }

    let best = class_size
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(c, _)| c);
    let selected: Vec<Cube> = cubes
        .iter()
        .zip(&color)
        .filter(|(_, c)| c.is_some() && **c == best)
        .map(|(cube, _)| *cube)
        .collect();

    debug!(
        "kept {} of {} active cubes after colouring into {} classes",
        selected.len(),
        cubes.len(),
        class_size.len()
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_grid() -> ScalarGrid {
        ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |p| {
            (p.x + 2.0 * p.y + 3.0 * p.z) as f32
        })
    }

    #[test]
    fn test_value_out_of_range_is_zero() {
        let grid = linear_grid();
        assert_eq!(grid.value(-1, 0, 0), 0.0);
        assert_eq!(grid.value(0, 4, 0), 0.0);
        assert_eq!(grid.value(1, 1, 1), 6.0);
    }

    #[test]
    fn test_trilinear_reproduces_linear_field() {
        let grid = linear_grid();
        let p = DVec3::new(1.25, 0.5, 2.75);
        assert_relative_eq!(grid.trilinear(p), (1.25 + 1.0 + 8.25) as f32, epsilon = 1e-5);
    }

    #[test]
    fn test_trilinear_clamps_outside_points() {
        let grid = linear_grid();
        let outside = DVec3::new(-5.0, 1.0, 10.0);
        let clamped = DVec3::new(0.0, 1.0, 3.0);
        assert_eq!(grid.trilinear(outside), grid.trilinear(clamped));
    }

    #[test]
    fn test_trilinear_at_far_corner() {
        let grid = linear_grid();
        assert_relative_eq!(grid.trilinear(DVec3::splat(3.0)), 18.0, epsilon = 1e-5);
    }

    #[test]
    fn test_from_data_length_check() {
        let result = ScalarGrid::from_data([2, 2, 2], DVec3::ONE, DVec3::ZERO, vec![0.0; 7]);
        assert!(result.is_err());
        let result = ScalarGrid::from_data([2, 2, 2], DVec3::ONE, DVec3::ZERO, vec![0.0; 8]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_cube_activity() {
        let mut grid = ScalarGrid::new([2, 2, 2], DVec3::ONE, DVec3::ZERO);
        assert!(!grid.is_cube_active(0, 0, 0, 0.5));
        grid.set_value(1, 1, 1, 1.0);
        assert!(grid.is_cube_active(0, 0, 0, 0.5));
        // Not fully inside the grid
        assert!(!grid.is_cube_active(1, 0, 0, 0.5));
    }

    #[test]
    fn test_active_cubes_order_and_centers() {
        let grid = ScalarGrid::from_fn([3, 3, 3], DVec3::splat(2.0), DVec3::ZERO, |p| p.x as f32);
        let cubes = grid.active_cubes(1.0);
        assert_eq!(cubes.len(), 4);
        assert_eq!(cubes[0].index, [0, 0, 0]);
        assert_eq!(cubes[1].index, [0, 0, 1]);
        assert_eq!(cubes[0].center, DVec3::splat(1.0));
        assert!(cubes.iter().all(|c| c.index[0] == 0));
    }

    #[test]
    fn test_constant_field_has_no_active_cubes() {
        let grid = ScalarGrid::from_fn([5, 5, 5], DVec3::ONE, DVec3::ZERO, |_| 3.0);
        assert!(grid.active_cubes(1.0).is_empty());
        assert!(grid.active_cubes(3.5).is_empty());
    }

    #[test]
    fn test_supersample_dimensions_and_values() {
        let grid = linear_grid();
        let fine = grid.supersample(2);
        assert_eq!(fine.dims(), [7, 7, 7]);
        assert_eq!(fine.spacing, DVec3::splat(0.5));
        assert_eq!(fine.bounds(), grid.bounds());
        assert_relative_eq!(fine.value(1, 0, 0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(fine.value(6, 6, 6), grid.value(3, 3, 3), epsilon = 1e-5);
    }

    #[test]
    fn test_supersample_factor_one_is_identity() {
        let grid = linear_grid();
        assert_eq!(grid.supersample(1), grid);
    }

    #[test]
    fn test_separation_is_independent_and_maximal() {
        let grid = ScalarGrid::new([5, 5, 5], DVec3::ONE, DVec3::ZERO);
        let mut cubes = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                cubes.push(grid.cube(i, j, 0));
            }
        }

        let selected = separate_active_cubes(&cubes);
        let adjacent = |a: &Cube, b: &Cube| {
            a.index
                .iter()
                .zip(b.index.iter())
                .all(|(x, y)| (x - y).abs() <= 1)
        };

        for (n, a) in selected.iter().enumerate() {
            for b in &selected[n + 1..] {
                assert!(!adjacent(a, b));
            }
        }
        for cube in &cubes {
            assert!(selected.iter().any(|s| adjacent(s, cube)));
        }
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_coloring_keeps_largest_class() {
        let grid = ScalarGrid::new([5, 5, 5], DVec3::ONE, DVec3::ZERO);
        // The middle cube comes first and blocks both ends in greedy order
        let cubes = vec![grid.cube(1, 0, 0), grid.cube(0, 0, 0), grid.cube(2, 0, 0)];

        assert_eq!(separate_active_cubes(&cubes).len(), 1);
        let colored = separate_active_cubes_by_coloring(&cubes);
        let kept: Vec<[i32; 3]> = colored.iter().map(|c| c.index).collect();
        assert_eq!(kept, vec![[0, 0, 0], [2, 0, 0]]);
    }

    #[test]
    fn test_coloring_on_a_block_is_independent() {
        let grid = ScalarGrid::new([5, 5, 5], DVec3::ONE, DVec3::ZERO);
        let mut cubes = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..2 {
                    cubes.push(grid.cube(i, j, k));
                }
            }
        }
        let selected = separate_active_cubes_by_coloring(&cubes);
        for (n, a) in selected.iter().enumerate() {
            for b in &selected[n + 1..] {
                let near = a.index.iter().zip(b.index.iter()).all(|(x, y)| (x - y).abs() <= 1);
                assert!(!near);
            }
        }
        // Colour 0 takes every even (i, j, k) position: 2 * 2 * 1
        assert_eq!(selected.len(), 4);
        assert!(separate_active_cubes_by_coloring(&[]).is_empty());
    }
}
