//! Extraction pipeline and its output
//!
//! [`extract`] runs the full batch: supersampling, active-cube detection,
//! optional separation, triangulation, Voronoi construction, vertex placement
//! and triangle assembly. Each stage consumes the previous one in full.

use glam::{DVec3, Vec3};
use log::info;

use crate::assembly::{assemble_multi, assemble_single};
use crate::config::{ExtractionConfig, IsovertexMode, Separation};
use crate::error::Result;
use crate::geometry::BoundingBox;
use crate::grid::{separate_active_cubes, separate_active_cubes_by_coloring, Cube, ScalarGrid};
use crate::isovertex::{place_multi, place_single};
use crate::triangulation::build_triangulation;
use crate::voronoi::VoronoiDiagram;

/// Triangulated isosurface
///
/// Triangles index into `vertices` and are wound so that their normals point
/// toward lower scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoSurface {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl IsoSurface {
    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Check if surface is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.triangles.is_empty()
    }
}

/// Everything one extraction run produced
#[derive(Debug, Clone)]
pub struct Extraction {
    pub surface: IsoSurface,
    /// Cubes that seeded the triangulation (after separation)
    pub active_cubes: Vec<Cube>,
    /// Voronoi diagram, absent when no cube was active
    pub diagram: Option<VoronoiDiagram>,
    /// Box unbounded edges were clipped against
    pub bbox: BoundingBox,
}

/// Run the full extraction on a field
///
/// A field without any isovalue crossing yields an empty surface, not an error.
///
/// # Arguments
///
/// * `grid` - Sampled scalar field
/// * `config` - Isovalue, isovertex mode and preprocessing options
///
/// # Returns
///
/// The surface together with the active cubes, the Voronoi diagram and the
/// clipping box, so diagnostics can be written from the same run.
///
/// # Performance
///
/// Supersampling and single-mode vertex placement run in parallel with rayon,
/// as does multi-mode cycle extraction. Triangulation and triangle assembly
/// are sequential; memory grows linearly with the number of active cubes.
///
/// # Errors
///
/// Returns `Degenerate` when the active cube centers cannot be triangulated or
/// a Voronoi cell cannot be built.
///
/// # Example
///
/// ```rust
/// use voronoi_isosurface::*;
/// use glam::DVec3;
///
/// let grid = ScalarGrid::from_fn([8, 8, 8], DVec3::ONE, DVec3::ZERO, |p| {
///     p.distance(DVec3::splat(3.5)) as f32
/// });
/// let config = ExtractionConfigBuilder::new().isovalue(2.2).unwrap().build().unwrap();
///
/// let extraction = extract(&grid, &config).unwrap();
/// assert!(extraction.surface.triangle_count() > 0);
/// ```
pub fn extract(grid: &ScalarGrid, config: &ExtractionConfig) -> Result<Extraction> {
    let supersampled;
    let grid = match config.supersample {
        Some(factor) if factor > 1 => {
            supersampled = grid.supersample(factor);
            &supersampled
        }
        _ => grid,
    };
    let bbox = BoundingBox::from_grid(grid);

    let mut cubes = grid.active_cubes(config.isovalue);
    if config.separate_active {
        cubes = match config.separation {
            Separation::Greedy => separate_active_cubes(&cubes),
            Separation::Coloring => separate_active_cubes_by_coloring(&cubes),
        };
    }
    info!(
        "{} active cubes at isovalue {} ({} mode)",
        cubes.len(),
        config.isovalue,
        config.mode.name()
    );

    if cubes.is_empty() {
        return Ok(Extraction {
            surface: IsoSurface::default(),
            active_cubes: cubes,
            diagram: None,
            bbox,
        });
    }

    let triangulation = build_triangulation(&cubes, grid, config.mode)?;
    let mut diagram =
        VoronoiDiagram::build(triangulation, grid, config.mode, config.cell_construction)?;

    let (vertices, triangles) = match config.mode {
        IsovertexMode::Single => {
            let placed = place_single(grid, &cubes, config.isovalue);
            let mut vertices: Vec<DVec3> = Vec::new();
            let iso_vertex_of: Vec<Option<usize>> = placed
                .iter()
                .map(|p| {
                    p.map(|position| {
                        vertices.push(position);
                        vertices.len() - 1
                    })
                })
                .collect();
            let triangles =
                assemble_single(&diagram, grid, &bbox, config.isovalue, &iso_vertex_of);
            (vertices, triangles)
        }
        IsovertexMode::Multi => {
            let vertices = place_multi(&mut diagram, config.isovalue);
            let triangles = assemble_multi(&diagram, grid, &bbox, config.isovalue);
            (vertices, triangles)
        }
    };

    let surface = IsoSurface {
        vertices: vertices.iter().map(|v| v.as_vec3()).collect(),
        triangles,
    };
    info!(
        "isosurface: {} vertices, {} triangles",
        surface.vertex_count(),
        surface.triangle_count()
    );

    Ok(Extraction {
        surface,
        active_cubes: cubes,
        diagram: Some(diagram),
        bbox,
    })
}

/// Convenience wrapper returning only the surface
pub fn extract_surface(grid: &ScalarGrid, config: &ExtractionConfig) -> Result<IsoSurface> {
    Ok(extract(grid, config)?.surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::config::{CellConstruction, ExtractionConfigBuilder};
    use crate::error::VoronoiError;
    use crate::geometry::triangle_normal;

    fn sphere_grid() -> ScalarGrid {
        ScalarGrid::from_fn([8, 8, 8], DVec3::ONE, DVec3::ZERO, |p| {
            p.distance(DVec3::splat(3.5)) as f32
        })
    }

    fn config(mode: IsovertexMode) -> ExtractionConfig {
        ExtractionConfigBuilder::new()
            .isovalue(2.2)
            .unwrap()
            .mode(mode)
            .build()
            .unwrap()
    }

    fn assert_valid_triangles(surface: &IsoSurface) {
        let n = surface.vertex_count() as u32;
        for &[a, b, c] in &surface.triangles {
            assert!(a < n && b < n && c < n);
            assert!(a != b && b != c && a != c);
        }
    }

    /// Every undirected edge is used by exactly two triangles, once per direction
    fn assert_closed_manifold(surface: &IsoSurface) {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for &[a, b, c] in &surface.triangles {
            for edge in [(a, b), (b, c), (c, a)] {
                *directed.entry(edge).or_insert(0) += 1;
            }
        }
        for (&(a, b), &count) in &directed {
            assert_eq!(count, 1, "edge ({}, {}) used {} times", a, b, count);
            assert_eq!(directed.get(&(b, a)), Some(&1), "edge ({}, {}) is open", a, b);
        }
    }

    /// Normals face `center`, where the field is lowest
    fn assert_normals_toward(surface: &IsoSurface, center: DVec3) {
        for &[a, b, c] in &surface.triangles {
            let [pa, pb, pc] = [a, b, c].map(|i| surface.vertices[i as usize].as_dvec3());
            let n = triangle_normal(pa, pb, pc);
            let centroid = (pa + pb + pc) / 3.0;
            assert!(n.dot(centroid - center) < 0.0, "triangle {:?} faces outward", [a, b, c]);
        }
    }

    #[test]
    fn test_sphere_is_closed_and_faces_inward() {
        for mode in [IsovertexMode::Single, IsovertexMode::Multi] {
            let surface = extract_surface(&sphere_grid(), &config(mode)).unwrap();
            assert!(surface.triangle_count() > 0);
            assert_closed_manifold(&surface);
            assert_normals_toward(&surface, DVec3::splat(3.5));
        }
    }

    #[test]
    fn test_adjacent_cubes_are_joined_by_triangles() {
        // One low grid point: its eight surrounding cubes are active
        let grid = ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |p| {
            if p == DVec3::splat(2.0) {
                -1.0
            } else {
                1.0
            }
        });
        let single = config(IsovertexMode::Single).clone_with_isovalue(0.0);
        let extraction = extract(&grid, &single).unwrap();
        let cubes = &extraction.active_cubes;
        let surface = &extraction.surface;
        assert_eq!(cubes.len(), 8);
        assert_eq!(surface.vertex_count(), 8);

        // Every cube has a vertex, so isovertex i belongs to cube i
        let vertex_of =
            |index: [i32; 3]| cubes.iter().position(|c| c.index == index).unwrap() as u32;
        let (a, b) = (vertex_of([1, 1, 1]), vertex_of([2, 1, 1]));
        assert!(surface
            .triangles
            .iter()
            .any(|t| t.contains(&a) && t.contains(&b)));

        // Two triangles per face of the 2x2x2 block, each on a single face
        assert_eq!(surface.triangle_count(), 12);
        for t in &surface.triangles {
            let index = t.map(|v| cubes[v as usize].index);
            assert!((0..3).any(|d| index[0][d] == index[1][d] && index[1][d] == index[2][d]));
        }
        assert_closed_manifold(surface);
        assert_normals_toward(surface, DVec3::splat(2.0));
    }

    #[test]
    fn test_two_sheets_in_one_cell_get_distinct_vertices() {
        // Opposite corners of cube (1, 1, 1) are high: two sheets cross its cell
        let grid = ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |p| {
            if p == DVec3::ONE || p == DVec3::splat(2.0) {
                1.0
            } else {
                0.0
            }
        });
        let multi = config(IsovertexMode::Multi).clone_with_isovalue(0.5);
        let extraction = extract(&grid, &multi).unwrap();
        let diagram = extraction.diagram.as_ref().unwrap();
        let surface = &extraction.surface;

        let site = extraction
            .active_cubes
            .iter()
            .position(|c| c.index == [1, 1, 1])
            .unwrap();
        let cell = &diagram.cells[diagram.cell_of_vertex(site).unwrap()];
        assert_eq!(cell.num_iso, 2);

        let first = cell.iso_start as u32;
        let second = first + 1;
        assert!(surface.triangles.iter().any(|t| t.contains(&first)));
        assert!(surface.triangles.iter().any(|t| t.contains(&second)));
        assert!(!surface
            .triangles
            .iter()
            .any(|t| t.contains(&first) && t.contains(&second)));

        // Each sheet sits near the high corner it wraps
        let near = |v: u32, corner: DVec3| {
            surface.vertices[v as usize].as_dvec3().distance(corner) < 0.5
        };
        assert!(near(first, DVec3::ONE) != near(second, DVec3::ONE));
        assert!(near(first, DVec3::splat(2.0)) != near(second, DVec3::splat(2.0)));
    }

    #[test]
    fn test_sphere_single_mode() {
        let extraction = extract(&sphere_grid(), &config(IsovertexMode::Single)).unwrap();
        let surface = &extraction.surface;
        assert!(surface.vertex_count() > 0);
        assert!(surface.triangle_count() > 0);
        assert_valid_triangles(surface);

        // Every vertex is near the sphere of radius 2.2
        for v in &surface.vertices {
            let r = v.as_dvec3().distance(DVec3::splat(3.5));
            assert!((r - 2.2).abs() < 1.0, "vertex at radius {}", r);
        }
    }

    #[test]
    fn test_sphere_multi_mode() {
        let extraction = extract(&sphere_grid(), &config(IsovertexMode::Multi)).unwrap();
        let surface = &extraction.surface;
        assert!(surface.triangle_count() > 0);
        assert_valid_triangles(surface);

        let diagram = extraction.diagram.unwrap();
        assert_eq!(diagram.cells.len(), extraction.active_cubes.len());
        let total: usize = diagram.cells.iter().map(|c| c.num_iso).sum();
        assert_eq!(total, surface.vertex_count());
    }

    #[test]
    fn test_multi_mode_with_hull_cells() {
        let mut cfg = config(IsovertexMode::Multi);
        cfg.cell_construction = CellConstruction::ConvexHull;
        let surface = extract_surface(&sphere_grid(), &cfg).unwrap();
        assert_valid_triangles(&surface);
    }

    #[test]
    fn test_planar_slab_needs_dummy_points() {
        // A plane between x = 1 and x = 2 activates one flat slab of cubes
        let grid = ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |p| p.x as f32);

        let single = config(IsovertexMode::Single).clone_with_isovalue(1.4);
        let result = extract(&grid, &single);
        assert!(matches!(result, Err(VoronoiError::Degenerate(_))));

        let multi = config(IsovertexMode::Multi).clone_with_isovalue(1.4);
        let extraction = extract(&grid, &multi).unwrap();
        assert_eq!(extraction.active_cubes.len(), 9);
        assert!(extraction.surface.triangle_count() > 0);
        assert_valid_triangles(&extraction.surface);
    }

    #[test]
    fn test_constant_field_is_empty() {
        let grid = ScalarGrid::from_fn([6, 6, 6], DVec3::ONE, DVec3::ZERO, |_| 1.0);
        for mode in [IsovertexMode::Single, IsovertexMode::Multi] {
            let extraction = extract(&grid, &config(mode)).unwrap();
            assert!(extraction.active_cubes.is_empty());
            assert!(extraction.surface.is_empty());
            assert!(extraction.diagram.is_none());
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let grid = sphere_grid();
        for mode in [IsovertexMode::Single, IsovertexMode::Multi] {
            let first = extract_surface(&grid, &config(mode)).unwrap();
            let second = extract_surface(&grid, &config(mode)).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_separation_and_supersampling() {
        let grid = sphere_grid();
        let cfg = ExtractionConfigBuilder::new()
            .isovalue(2.2)
            .unwrap()
            .separate_active(true)
            .supersample(2)
            .unwrap()
            .build()
            .unwrap();

        let extraction = extract(&grid, &cfg).unwrap();
        assert_valid_triangles(&extraction.surface);

        let cubes = &extraction.active_cubes;
        for (n, a) in cubes.iter().enumerate() {
            for b in &cubes[n + 1..] {
                let near = a.index.iter().zip(b.index.iter()).all(|(x, y)| (x - y).abs() <= 1);
                assert!(!near);
            }
        }
        let (min, max) = grid.bounds();
        for v in &extraction.surface.vertices {
            let v = v.as_dvec3();
            assert!(v.cmpge(min - 1e-3).all() && v.cmple(max + 1e-3).all());
        }
    }

    #[test]
    fn test_too_few_active_cubes_is_degenerate() {
        // Only the corner cube crosses the isovalue
        let mut grid = ScalarGrid::from_fn([4, 4, 4], DVec3::ONE, DVec3::ZERO, |_| 1.0);
        grid.set_value(0, 0, 0, -1.0);
        let result = extract(&grid, &config(IsovertexMode::Single).clone_with_isovalue(0.0));
        assert!(matches!(result, Err(VoronoiError::Degenerate(_))));
    }

    trait WithIsovalue {
        fn clone_with_isovalue(&self, isovalue: f32) -> Self;
    }

    impl WithIsovalue for ExtractionConfig {
        fn clone_with_isovalue(&self, isovalue: f32) -> Self {
            ExtractionConfig { isovalue, ..*self }
        }
    }
}
