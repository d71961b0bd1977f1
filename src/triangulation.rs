//! Triangulation of active cube centers
//!
//! Real vertices are the active cube centers, in cube order, so real vertex
//! `i` always stands for cube `i`. In multi-isovertex mode the point set is
//! closed off with dummy points placed one grid step beyond the active region
//! on all six sides, which makes every real vertex an interior point and
//! therefore gives it a bounded Voronoi cell.

use glam::DVec3;
use log::info;

use crate::config::IsovertexMode;
use crate::error::Result;
use crate::geometry::delaunay::{LabeledPoint, Triangulation};
use crate::grid::{Cube, ScalarGrid};

/// Projection of the active cubes onto one outer face of their index range
///
/// Axis `d` is the face normal; the slice spans axes `(d + 1) % 3` and
/// `(d + 2) % 3`. A flag is set wherever an active cube projects.
#[derive(Debug, Clone)]
pub struct GridFacets {
    pub axis: usize,
    /// 0 for the low side, 1 for the high side
    pub side: usize,
    min: [i32; 3],
    max: [i32; 3],
    width: usize,
    height: usize,
    flags: Vec<bool>,
}

impl GridFacets {
    fn new(axis: usize, side: usize, min: [i32; 3], max: [i32; 3]) -> Self {
        let d1 = (axis + 1) % 3;
        let d2 = (axis + 2) % 3;
        let width = (max[d1] - min[d1] + 1) as usize;
        let height = (max[d2] - min[d2] + 1) as usize;
        Self {
            axis,
            side,
            min,
            max,
            width,
            height,
            flags: vec![false; width * height],
        }
    }

    /// Build the six face slices (axis-major, low side first) of a cube set
    pub fn from_cubes(cubes: &[Cube]) -> Vec<GridFacets> {
        if cubes.is_empty() {
            return Vec::new();
        }

        let mut min = [i32::MAX; 3];
        let mut max = [i32::MIN; 3];
        for cube in cubes {
            for d in 0..3 {
                min[d] = min[d].min(cube.index[d]);
                max[d] = max[d].max(cube.index[d]);
            }
        }

        let mut facets = Vec::with_capacity(6);
        for axis in 0..3 {
            for side in 0..2 {
                let mut facet = GridFacets::new(axis, side, min, max);
                for cube in cubes {
                    facet.set_flag(cube.index);
                }
                facets.push(facet);
            }
        }
        facets
    }

    fn local(&self, index: [i32; 3]) -> (usize, usize) {
        let d1 = (self.axis + 1) % 3;
        let d2 = (self.axis + 2) % 3;
        (
            (index[d1] - self.min[d1]) as usize,
            (index[d2] - self.min[d2]) as usize,
        )
    }

    fn set_flag(&mut self, index: [i32; 3]) {
        let (a, b) = self.local(index);
        self.flags[a + self.width * b] = true;
    }

    /// Whether any active cube projects onto local slice position `(a, b)`
    pub fn flag(&self, a: usize, b: usize) -> bool {
        a < self.width && b < self.height && self.flags[a + self.width * b]
    }

    pub fn num_flagged(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// One dummy point per flagged slice cell, one grid step outside the range
    pub fn dummy_points(&self, grid: &ScalarGrid) -> Vec<DVec3> {
        let d1 = (self.axis + 1) % 3;
        let d2 = (self.axis + 2) % 3;
        let outside = if self.side == 0 {
            self.min[self.axis] - 1
        } else {
            self.max[self.axis] + 1
        };

        let mut points = Vec::with_capacity(self.num_flagged());
        for b in 0..self.height {
            for a in 0..self.width {
                if !self.flag(a, b) {
                    continue;
                }
                let mut index = [0i32; 3];
                index[self.axis] = outside;
                index[d1] = self.min[d1] + a as i32;
                index[d2] = self.min[d2] + b as i32;
                points.push(cube_center(grid, index));
            }
        }
        points
    }
}

fn cube_center(grid: &ScalarGrid, index: [i32; 3]) -> DVec3 {
    let idx = DVec3::new(index[0] as f64, index[1] as f64, index[2] as f64);
    grid.origin + (idx + 0.5) * grid.spacing
}

/// Triangulation input for a set of active cubes
///
/// Real points come first, in cube order; dummy points follow.
pub fn labeled_points(cubes: &[Cube], grid: &ScalarGrid, mode: IsovertexMode) -> Vec<LabeledPoint> {
    let mut points: Vec<LabeledPoint> = cubes.iter().map(|c| LabeledPoint::real(c.center)).collect();

    if mode == IsovertexMode::Multi {
        for facet in GridFacets::from_cubes(cubes) {
            points.extend(facet.dummy_points(grid).into_iter().map(LabeledPoint::dummy));
        }
    }
    points
}

/// Delaunay triangulation of the active cube centers (plus dummies in multi mode)
///
/// # Errors
///
/// Propagates `Degenerate` from the triangulation when the point set cannot be
/// triangulated (for example fewer than 4 active cubes in single mode).
pub fn build_triangulation(
    cubes: &[Cube],
    grid: &ScalarGrid,
    mode: IsovertexMode,
) -> Result<Triangulation> {
    let points = labeled_points(cubes, grid, mode);
    let dummies = points.len() - cubes.len();
    let triangulation = Triangulation::build(&points)?;

    info!(
        "Delaunay triangulation: {} real + {} dummy vertices, {} finite cells",
        cubes.len(),
        dummies,
        triangulation.finite_cells().count()
    );
    Ok(triangulation)
}
