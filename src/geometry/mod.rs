//! Geometric primitives
//!
//! Exact orientation and in-sphere predicates (via `robust`), circumcenters,
//! and clipping of unbounded lines against the sampled domain (via parry3d's
//! AABB clipping).

pub mod delaunay;

use glam::DVec3;
use parry3d::bounding_volume::Aabb;
use parry3d::math::{Point, Vector};
use parry3d::query::Ray;
use robust::Coord3D;

use crate::grid::ScalarGrid;

fn coord(p: DVec3) -> Coord3D<f64> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

/// Exact orientation of `d` relative to the plane through `a`, `b`, `c`
///
/// Positive when `d` lies below the plane, i.e. `a`, `b`, `c` appear
/// counterclockwise when viewed from the side opposite `d`. Zero when the four
/// points are coplanar.
pub fn orient3d(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    robust::orient3d(coord(a), coord(b), coord(c), coord(d))
}

/// Exact in-sphere test of `e` against the sphere through `a`, `b`, `c`, `d`
///
/// Positive when `e` is strictly inside, zero when cospherical. The sign is
/// only meaningful when `orient3d(a, b, c, d) > 0`.
pub fn insphere(a: DVec3, b: DVec3, c: DVec3, d: DVec3, e: DVec3) -> f64 {
    robust::insphere(coord(a), coord(b), coord(c), coord(d), coord(e))
}

/// Whether three points lie on a common line (exact)
pub fn collinear(a: DVec3, b: DVec3, c: DVec3) -> bool {
    let xy = robust::orient2d(
        robust::Coord { x: a.x, y: a.y },
        robust::Coord { x: b.x, y: b.y },
        robust::Coord { x: c.x, y: c.y },
    );
    let yz = robust::orient2d(
        robust::Coord { x: a.y, y: a.z },
        robust::Coord { x: b.y, y: b.z },
        robust::Coord { x: c.y, y: c.z },
    );
    let xz = robust::orient2d(
        robust::Coord { x: a.x, y: a.z },
        robust::Coord { x: b.x, y: b.z },
        robust::Coord { x: c.x, y: c.z },
    );
    xy == 0.0 && yz == 0.0 && xz == 0.0
}

/// Center of the sphere through four non-coplanar points
pub fn circumcenter(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> DVec3 {
    let ba = b - a;
    let ca = c - a;
    let da = d - a;

    let denominator = 2.0 * ba.dot(ca.cross(da));
    let numerator = ba.length_squared() * ca.cross(da)
        + ca.length_squared() * da.cross(ba)
        + da.length_squared() * ba.cross(ca);

    a + numerator / denominator
}

/// Unnormalized normal of the triangle `(a, b, c)`
pub fn triangle_normal(a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    (b - a).cross(c - a)
}

fn to_point(p: DVec3) -> Point<f32> {
    Point::new(p.x as f32, p.y as f32, p.z as f32)
}

fn to_vector(v: DVec3) -> Vector<f32> {
    Vector::new(v.x as f32, v.y as f32, v.z as f32)
}

/// Axis-aligned box used to clip unbounded Voronoi edges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    aabb: Aabb,
}

impl BoundingBox {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            aabb: Aabb::new(to_point(min), to_point(max)),
        }
    }

    /// Real-space bounds of a grid's sample lattice
    pub fn from_grid(grid: &ScalarGrid) -> Self {
        let (min, max) = grid.bounds();
        Self::new(min, max)
    }

    pub fn min(&self) -> DVec3 {
        let m = self.aabb.mins;
        DVec3::new(m.x as f64, m.y as f64, m.z as f64)
    }

    pub fn max(&self) -> DVec3 {
        let m = self.aabb.maxs;
        DVec3::new(m.x as f64, m.y as f64, m.z as f64)
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min()).all() && point.cmple(self.max()).all()
    }

    /// Intersect the ray `origin + t * direction, t >= 0` with the box
    ///
    /// Returns the entry and exit points of the clipped segment.
    pub fn clip_ray(&self, origin: DVec3, direction: DVec3) -> Option<(DVec3, DVec3)> {
        let ray = Ray::new(to_point(origin), to_vector(direction));
        let (tmin, tmax) = self.aabb.clip_ray_parameters(&ray)?;
        Some((
            origin + direction * tmin as f64,
            origin + direction * tmax as f64,
        ))
    }

    /// Intersect the infinite line through `point` along `direction` with the box
    pub fn clip_line(&self, point: DVec3, direction: DVec3) -> Option<(DVec3, DVec3)> {
        let (tmin, tmax) = self
            .aabb
            .clip_line_parameters(&to_point(point), &to_vector(direction))?;
        Some((
            point + direction * tmin as f64,
            point + direction * tmax as f64,
        ))
    }
}
