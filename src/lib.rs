//! Voronoi-based isosurface extraction
//!
//! Extracts a triangle mesh approximating `f(x) = isovalue` from a regularly
//! sampled scalar field. Active cube centers are triangulated, the dual Voronoi
//! diagram is built, and every Voronoi edge crossing the isovalue contributes
//! triangles dual to it.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voronoi_isosurface::*;
//!
//! let grid = grid::nrrd::load("volume.nrrd").unwrap();
//! let config = ExtractionConfigBuilder::new()
//!     .isovalue(0.5).unwrap()
//!     .mode(IsovertexMode::Multi)
//!     .build().unwrap();
//!
//! let surface = extract_surface(&grid, &config).unwrap();
//! println!("Extracted {} triangles", surface.triangle_count());
//! ```
//!
//! # Modes
//!
//! - [`IsovertexMode::Single`]: one isosurface vertex per active cube
//! - [`IsovertexMode::Multi`]: one isosurface vertex per surface sheet through
//!   each Voronoi cell, resolving configurations a single vertex would merge
//!
//! # Features
//!
//! - `serde`: Enables serialization support for configuration

// Modules
pub mod error;
pub mod config;
pub mod grid;
pub mod geometry;
pub mod spatial;
pub mod triangulation;
pub mod voronoi;
pub mod isovertex;
pub mod assembly;
pub mod surface;
pub mod mesh;
pub mod diagnostics;

// Re-export core types for convenience
pub use error::{VoronoiError, Result};
pub use config::{
    CellConstruction, ExtractionConfig, ExtractionConfigBuilder, IsovertexMode, Separation,
};
pub use grid::{Cube, ScalarGrid};
pub use geometry::BoundingBox;
pub use spatial::SpatialIndex;
pub use voronoi::VoronoiDiagram;
pub use surface::{extract, extract_surface, Extraction, IsoSurface};
pub use mesh::{write_mesh, MeshFormat, PlyEncoding};

// Re-export glam vectors for convenience
pub use glam::{DVec3, Vec3};
