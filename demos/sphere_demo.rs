//! Single vs multi isovertex extraction on two nearly touching spheres

use voronoi_isosurface::*;

fn main() -> Result<()> {
    println!("=== voronoi_isosurface Sphere Demo ===\n");

    // Two spheres whose surfaces pass within one grid step of each other
    let centers = [DVec3::new(5.0, 6.0, 6.0), DVec3::new(9.6, 6.0, 6.0)];
    let grid = ScalarGrid::from_fn([13, 13, 13], DVec3::ONE, DVec3::ZERO, |p| {
        centers
            .iter()
            .map(|c| p.distance(*c))
            .fold(f64::INFINITY, f64::min) as f32
    });
    let [nx, ny, nz] = grid.dims();
    println!("Grid: {}x{}x{}", nx, ny, nz);

    for mode in [IsovertexMode::Single, IsovertexMode::Multi] {
        let config = ExtractionConfigBuilder::new()
            .isovalue(2.2)?
            .mode(mode)
            .build()?;

        let extraction = extract(&grid, &config)?;
        println!("\n{} mode:", mode.name());
        println!("  Active cubes: {}", extraction.active_cubes.len());
        if let Some(diagram) = &extraction.diagram {
            println!("  Voronoi vertices: {}", diagram.vertices.len());
            println!("  Voronoi edges: {}", diagram.edges.len());
        }
        println!("  Vertices: {}", extraction.surface.vertex_count());
        println!("  Triangles: {}", extraction.surface.triangle_count());

        let path = std::env::temp_dir().join(format!("sphere_demo_{}.off", mode.name()));
        write_mesh(&extraction.surface, &path, MeshFormat::Off, PlyEncoding::Ascii)?;
        println!("  Wrote {}", path.display());
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
